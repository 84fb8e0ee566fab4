//! Long-running daily jobs.
//!
//! `serve` drives one shared [`DailyRun`] from timers. Records are generated
//! ahead of the posting time and published at it, generating first when nothing
//! is stored yet. Old data is cleaned every few days. A failed job is logged and
//! tried again at its next slot.

use crate::config::HolicastConfig;
use crate::daily::DailyRun;
use crate::error::ApiError;
use crate::storage::Holiday;
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Local wall-clock time in the configured timezone.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// System time shifted by a fixed UTC offset.
pub struct OffsetWallClock {
    offset: FixedOffset,
}

impl OffsetWallClock {
    pub fn new(offset_hours: i32) -> Result<Self, ApiError> {
        let offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            ApiError::ConfigError(format!("Invalid timezone offset: {} hours", offset_hours))
        })?;
        Ok(Self { offset })
    }
}

impl WallClock for OffsetWallClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Delivers the day's records to their audience.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, date: NaiveDate, holidays: &[Holiday]) -> Result<(), ApiError>;
}

/// Publishes captions to the log.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, date: NaiveDate, holidays: &[Holiday]) -> Result<(), ApiError> {
        let mut rng = rand::thread_rng();
        for holiday in holidays {
            info!(
                %date,
                caption = %holiday.caption(&mut rng),
                image = ?holiday.image_path,
                "Publishing holiday"
            );
        }
        Ok(())
    }
}

/// Time until the next occurrence of `at`, strictly after `now`.
pub fn until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today_at = now.date().and_time(at);
    let next = if today_at > now {
        today_at
    } else {
        today_at + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Generate,
    Post,
    Clean,
}

pub struct DailySchedule {
    daily: Arc<DailyRun>,
    publisher: Arc<dyn Publisher>,
    wall: Arc<dyn WallClock>,
    generate_at: NaiveTime,
    post_at: NaiveTime,
    clean_every: Duration,
}

impl DailySchedule {
    pub fn new(
        daily: Arc<DailyRun>,
        publisher: Arc<dyn Publisher>,
        wall: Arc<dyn WallClock>,
        generate_at: NaiveTime,
        post_at: NaiveTime,
        clean_every: Duration,
    ) -> Self {
        Self {
            daily,
            publisher,
            wall,
            generate_at,
            post_at,
            clean_every,
        }
    }

    pub fn from_config(
        config: &HolicastConfig,
        daily: Arc<DailyRun>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, ApiError> {
        let schedule = &config.schedule;
        Ok(Self::new(
            daily,
            publisher,
            Arc::new(OffsetWallClock::new(config.storage.timezone_offset_hours)?),
            schedule.generate_time()?,
            schedule.post_time()?,
            schedule.clean_interval(),
        ))
    }

    /// Run one job now for the current local date.
    pub async fn run_job(&self, job: Job) -> Result<(), ApiError> {
        let today = self.wall.now().date();
        match job {
            Job::Generate => {
                self.daily.run(today, false).await?;
            }
            Job::Post => {
                let holidays = self.daily.run(today, false).await?;
                self.publisher.publish(today, &holidays).await?;
            }
            Job::Clean => {
                self.daily.clean(today)?;
            }
        }
        Ok(())
    }

    /// Keep every timer running until `shutdown` resolves.
    pub async fn serve_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            generate_at = %self.generate_at,
            post_at = %self.post_at,
            clean_every_secs = self.clean_every.as_secs(),
            "Scheduler started"
        );
        tokio::select! {
            _ = shutdown => info!("Scheduler stopping"),
            _ = async {
                tokio::join!(
                    self.daily_at(Job::Generate, self.generate_at),
                    self.daily_at(Job::Post, self.post_at),
                    self.every(Job::Clean, self.clean_every),
                )
            } => {}
        }
    }

    async fn daily_at(&self, job: Job, at: NaiveTime) {
        loop {
            tokio::time::sleep(until_next(self.wall.now(), at)).await;
            self.run_logged(job).await;
        }
    }

    async fn every(&self, job: Job, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            self.run_logged(job).await;
        }
    }

    async fn run_logged(&self, job: Job) {
        info!(?job, "Running scheduled job");
        if let Err(e) = self.run_job(job).await {
            error!(?job, error = %e, "Scheduled job failed");
        }
    }
}
