//! Prompt list in, image list out.
//!
//! Turns an ordered prompt list into an ordered artifact list of the same
//! length. One item's failure never skips or shifts another item; the only
//! fatal error is malformed input.

use crate::clock::{Clock, TokioClock};
use crate::config::{HolicastConfig, PipelineConfig};
use crate::error::ApiError;
use crate::policy::DegradationPolicy;
use crate::provider::{BackendFactory, ImageBackend, ImageJobClient};
use crate::scheduler::RateLimiter;
use crate::translate::{GoogleTranslator, Translator};
use crate::types::{AttemptOutcome, ImageArtifact, ImageBytes, Prompt, RateBudget};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Lock shared by every pipeline that talks to the same provider account.
pub type RunLock = Arc<Mutex<()>>;

/// Counters reported at the end of every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub prompts: usize,
    pub generated: usize,
    pub failed: usize,
    pub rounds: u32,
    pub deadline_hit: bool,
}

/// Artifacts plus the summary of the batch that produced them.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub artifacts: Vec<ImageArtifact>,
    pub summary: BatchSummary,
}

/// One slot per prompt, filled in place as results arrive.
struct ArtifactSlots(Vec<ImageBytes>);

impl Extend<(usize, ImageBytes)> for ArtifactSlots {
    fn extend<T: IntoIterator<Item = (usize, ImageBytes)>>(&mut self, iter: T) {
        for (index, bytes) in iter {
            if let Some(slot) = self.0.get_mut(index) {
                *slot = bytes;
            }
        }
    }
}

pub struct Pipeline {
    policy: Arc<DegradationPolicy>,
    budget: RateBudget,
    clock: Arc<dyn Clock>,
    rounds: u32,
    deadline: Option<Duration>,
    run_lock: RunLock,
}

impl Pipeline {
    pub fn new(
        policy: Arc<DegradationPolicy>,
        budget: RateBudget,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            policy,
            budget,
            clock,
            rounds: config.rounds.max(1),
            deadline: config.deadline(),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wire a pipeline around an already constructed backend.
    pub fn with_backend(
        backend: Arc<dyn ImageBackend>,
        translator: Option<Arc<dyn Translator>>,
        config: &HolicastConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = config.generator.settings();
        let budget = settings.rate_budget;
        let client = ImageJobClient::new(backend, translator, settings, clock.clone());
        let policy = DegradationPolicy::new(Arc::new(client));
        Self::new(Arc::new(policy), budget, clock, &config.pipeline)
    }

    /// Production wiring: configured backend, Google translation, tokio timer.
    pub fn from_config(config: &HolicastConfig) -> Result<Self, ApiError> {
        let backend = BackendFactory::create(&config.generator)?;
        let translator: Option<Arc<dyn Translator>> = if config.generator.translate_prompt {
            let google = GoogleTranslator::new().map_err(|e| ApiError::HttpClient(e.to_string()))?;
            Some(Arc::new(google))
        } else {
            None
        };
        Ok(Self::with_backend(
            backend,
            translator,
            config,
            Arc::new(TokioClock::new()),
        ))
    }

    /// Share the account-level lock with other pipelines.
    pub fn with_run_lock(mut self, run_lock: RunLock) -> Self {
        self.run_lock = run_lock;
        self
    }

    pub fn run_lock(&self) -> RunLock {
        self.run_lock.clone()
    }

    /// One artifact per prompt, in input order. Empty bytes mean no image.
    pub async fn generate_all(&self, prompts: &[String]) -> Result<Vec<ImageArtifact>, ApiError> {
        Ok(self.run(prompts).await?.artifacts)
    }

    /// Like [`Pipeline::generate_all`], also returning the batch summary.
    pub async fn run(&self, prompts: &[String]) -> Result<BatchReport, ApiError> {
        let prompts = parse_prompts(prompts)?;
        if prompts.is_empty() {
            return Ok(BatchReport {
                artifacts: Vec::new(),
                summary: BatchSummary::default(),
            });
        }

        // Runs against one account queue behind each other.
        let _guard = self.run_lock.lock().await;

        let mut slots = ArtifactSlots(vec![ImageBytes::empty(); prompts.len()]);
        let mut rounds_run = 0u32;
        let deadline_hit = {
            let work = self.run_rounds(&prompts, &mut slots, &mut rounds_run);
            match self.deadline {
                Some(deadline) => tokio::time::timeout(deadline, work).await.is_err(),
                None => {
                    work.await;
                    false
                }
            }
        };

        let artifacts: Vec<ImageArtifact> = slots
            .0
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| ImageArtifact::new(index, bytes))
            .collect();
        let generated = artifacts.iter().filter(|a| !a.is_empty()).count();
        let summary = BatchSummary {
            prompts: prompts.len(),
            generated,
            failed: prompts.len() - generated,
            rounds: rounds_run,
            deadline_hit,
        };

        if deadline_hit {
            warn!(
                prompts = summary.prompts,
                generated = summary.generated,
                "Batch deadline reached, returning partial result"
            );
        }
        info!(
            prompts = summary.prompts,
            generated = summary.generated,
            failed = summary.failed,
            rounds = summary.rounds,
            "Batch finished"
        );

        Ok(BatchReport { artifacts, summary })
    }

    async fn run_rounds(&self, prompts: &[Prompt], slots: &mut ArtifactSlots, rounds_run: &mut u32) {
        let mut limiter = RateLimiter::new(self.budget, self.clock.clone());
        let mut pending: Vec<usize> = (0..prompts.len()).collect();

        for round in 1..=self.rounds {
            if pending.is_empty() {
                break;
            }
            *rounds_run = round;
            info!(round, prompts = pending.len(), "Starting generation round");

            limiter
                .run_batch_into(pending.clone(), slots, |_, index| {
                    let policy = self.policy.clone();
                    let prompt = prompts[index].clone();
                    async move {
                        let outcome = policy.generate_one(index, prompt.as_str()).await;
                        AttemptOutcome::new((index, outcome.result), outcome.requests_made)
                    }
                })
                .await;

            pending.retain(|&index| slots.0[index].is_empty());
        }
    }
}

fn parse_prompts(prompts: &[String]) -> Result<Vec<Prompt>, ApiError> {
    prompts
        .iter()
        .enumerate()
        .map(|(index, text)| Prompt::parse(text).ok_or(ApiError::InvalidPrompt { index }))
        .collect()
}
