//! What to do when an image attempt fails.
//!
//! Per-prompt reaction to failed attempts. A provider rejection (policy or
//! censorship) earns exactly one retry with the configured soft prompt; any
//! other failure yields an empty artifact straight away.

use crate::clock::Clock;
use crate::provider::ImageJobClient;
use crate::types::{AttemptOutcome, ImageBytes};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct DegradationPolicy {
    client: Arc<ImageJobClient>,
    soft_prompt: String,
    styles: Vec<Option<String>>,
    seed: u64,
    retry_pause: Duration,
    clock: Arc<dyn Clock>,
}

impl DegradationPolicy {
    /// Build the policy from the client's settings. Without a configured seed a
    /// random one is drawn once, so choices stay stable for this policy's lifetime.
    pub fn new(client: Arc<ImageJobClient>) -> Self {
        let settings = client.settings().clone();
        let seed = settings.seed.unwrap_or_else(rand::random);
        let clock = client.clock().clone();
        Self {
            soft_prompt: settings.soft_prompt,
            styles: settings.styles,
            seed,
            retry_pause: settings.rate_budget.per_request_delay(),
            clock,
            client,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Style for the prompt at `index`. Same seed and index, same style.
    pub fn style_for(&self, index: usize) -> Option<String> {
        let mut rng = StdRng::seed_from_u64(mix(self.seed, index));
        self.styles.choose(&mut rng).cloned().flatten()
    }

    /// Always produces an artifact; empty bytes mean "no image".
    pub async fn generate_one(&self, index: usize, prompt: &str) -> AttemptOutcome<ImageBytes> {
        let settings = self.client.settings();
        let style = self.style_for(index);

        let first = self
            .client
            .submit(prompt, style.as_deref(), settings.dimensions)
            .await;
        let mut requests_made = first.requests_made;

        let error = match first.result {
            Ok(bytes) => return AttemptOutcome::new(bytes, requests_made),
            Err(e) => e,
        };

        if !error.is_rejected() {
            debug!(index, error = %error, "Attempt failed, leaving empty artifact");
            return AttemptOutcome::new(ImageBytes::empty(), requests_made);
        }

        info!(index, "Prompt rejected, retrying once with the soft prompt");
        self.clock.sleep(self.retry_pause).await;

        let retry = self
            .client
            .submit(&self.soft_prompt, style.as_deref(), settings.dimensions)
            .await;
        requests_made += retry.requests_made;

        match retry.result {
            Ok(bytes) => AttemptOutcome::new(bytes, requests_made),
            Err(e) => {
                warn!(index, error = %e, "Soft prompt attempt failed");
                AttemptOutcome::new(ImageBytes::empty(), requests_made)
            }
        }
    }
}

/// Spread `(seed, index)` over the whole seed space.
fn mix(seed: u64, index: usize) -> u64 {
    let mut z = seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
