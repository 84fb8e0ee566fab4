//! Integration tests for the long-running schedule, driven by paused tokio time

use super::test_utils::FakeBackend;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use holicast::clock::ManualClock;
use holicast::config::HolicastConfig;
use holicast::daily::DailyRun;
use holicast::error::ApiError;
use holicast::gallery::Gallery;
use holicast::pipeline::Pipeline;
use holicast::schedule::{DailySchedule, Job, Publisher, WallClock};
use holicast::source::StaticSource;
use holicast::storage::{Holiday, RecordStore};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// Wall clock that moves with tokio's (paused) timer.
struct TimerWallClock {
    base: NaiveDateTime,
    started: Instant,
}

impl TimerWallClock {
    fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl WallClock for TimerWallClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap();
        self.base + elapsed
    }
}

#[derive(Default)]
struct RecordingPublisher {
    posts: Mutex<Vec<(NaiveDate, Vec<String>)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, date: NaiveDate, holidays: &[Holiday]) -> Result<(), ApiError> {
        let titles = holidays.iter().map(|h| h.title.clone()).collect();
        self.posts.lock().push((date, titles));
        Ok(())
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn daily_run(root: &Path, backend: Arc<FakeBackend>) -> Arc<DailyRun> {
    let mut config = HolicastConfig::default();
    config.generator.translate_prompt = false;
    config.generator.seed = Some(3);
    config.storage.root = root.to_path_buf();
    let pipeline = Pipeline::with_backend(backend, None, &config, Arc::new(ManualClock::new()));
    Arc::new(DailyRun::new(
        Arc::new(StaticSource::new(["Tea day"])),
        Arc::new(pipeline),
        Gallery::new(config.storage.gallery_path(), "png"),
        RecordStore::new(config.storage.records_path()),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_serve_generates_posts_and_cleans_on_schedule() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::new());
    let daily = daily_run(temp_dir.path(), backend.clone());
    let publisher = Arc::new(RecordingPublisher::default());
    let schedule = DailySchedule::new(
        daily.clone(),
        publisher.clone(),
        Arc::new(TimerWallClock::starting_at(date(19).and_time(time(8, 0)))),
        time(8, 30),
        time(9, 0),
        Duration::from_secs(24 * 3600),
    );

    // 08:00 on the 19th until 10:00 on the 20th.
    schedule
        .serve_until(tokio::time::sleep(Duration::from_secs(26 * 3600)))
        .await;

    let posts = publisher.posts.lock().clone();
    assert_eq!(
        posts,
        vec![
            (date(19), vec!["Tea day".to_string()]),
            (date(20), vec!["Tea day".to_string()]),
        ]
    );
    // Posting reuses what the morning job generated.
    assert_eq!(backend.count("Tea day"), 2);
    // The clean at 08:00 on the 20th dropped the 19th.
    assert!(!daily.records().exists(date(19)));
    assert!(daily.records().exists(date(20)));
}

#[tokio::test(start_paused = true)]
async fn test_post_generates_when_nothing_is_stored() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::new());
    let daily = daily_run(temp_dir.path(), backend.clone());
    let publisher = Arc::new(RecordingPublisher::default());
    let schedule = DailySchedule::new(
        daily.clone(),
        publisher.clone(),
        Arc::new(TimerWallClock::starting_at(date(19).and_time(time(12, 0)))),
        time(6, 0),
        time(9, 0),
        Duration::from_secs(7 * 24 * 3600),
    );

    schedule.run_job(Job::Post).await.unwrap();

    assert_eq!(backend.count("Tea day"), 1);
    assert_eq!(publisher.posts.lock().len(), 1);
    assert!(daily.records().exists(date(19)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_does_not_stop_the_service() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    // A file where the records directory should be makes every save fail.
    std::fs::write(root.join("storage"), b"not a directory").unwrap();
    let backend = Arc::new(FakeBackend::new());
    let daily = daily_run(root, backend.clone());
    let publisher = Arc::new(RecordingPublisher::default());
    let schedule = DailySchedule::new(
        daily,
        publisher.clone(),
        Arc::new(TimerWallClock::starting_at(date(19).and_time(time(8, 0)))),
        time(8, 30),
        time(9, 0),
        Duration::from_secs(7 * 24 * 3600),
    );

    schedule
        .serve_until(tokio::time::sleep(Duration::from_secs(26 * 3600)))
        .await;

    // Both days tried to generate at 08:30 and again when posting at 09:00.
    assert_eq!(backend.count("Tea day"), 4);
    assert!(publisher.posts.lock().is_empty());
}
