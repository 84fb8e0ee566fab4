//! Daily run: the day's titles become illustrated, persisted records.

use crate::config::HolicastConfig;
use crate::error::ApiError;
use crate::gallery::Gallery;
use crate::pipeline::Pipeline;
use crate::schedule::{OffsetWallClock, WallClock};
use crate::source::{MonthFileSource, PromptSource};
use crate::storage::{Holiday, RecordStore};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Current calendar date at a fixed UTC offset.
pub fn today(offset_hours: i32) -> Result<NaiveDate, ApiError> {
    Ok(OffsetWallClock::new(offset_hours)?.now().date())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub gallery_folders: usize,
    pub record_files: usize,
}

pub struct DailyRun {
    source: Arc<dyn PromptSource>,
    pipeline: Arc<Pipeline>,
    gallery: Gallery,
    records: RecordStore,
    guard: Mutex<()>,
}

impl DailyRun {
    pub fn new(
        source: Arc<dyn PromptSource>,
        pipeline: Arc<Pipeline>,
        gallery: Gallery,
        records: RecordStore,
    ) -> Self {
        Self {
            source,
            pipeline,
            gallery,
            records,
            guard: Mutex::new(()),
        }
    }

    pub fn from_config(config: &HolicastConfig) -> Result<Self, ApiError> {
        let storage = &config.storage;
        Ok(Self::new(
            Arc::new(MonthFileSource::new(storage.holidays_path())),
            Arc::new(Pipeline::from_config(config)?),
            Gallery::new(storage.gallery_path(), storage.image_extension.clone()),
            RecordStore::new(storage.records_path()),
        ))
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Records for `date`. Stored records are reused unless `force` is set.
    pub async fn run(&self, date: NaiveDate, force: bool) -> Result<Vec<Holiday>, ApiError> {
        let _guard = self.guard.lock().await;

        if !force && self.records.exists(date) {
            info!(%date, "Records already exist, reusing them");
            return Ok(self.records.load(date)?);
        }

        let titles = self.source.prompts_for(date).await?;
        info!(%date, titles = titles.len(), force, "Starting daily run");

        let artifacts = self.pipeline.generate_all(&titles).await?;
        let paths = self.gallery.save_images(date, &artifacts)?;

        let holidays: Vec<Holiday> = titles
            .into_iter()
            .zip(paths)
            .map(|(title, path)| Holiday::new(title, path))
            .collect();
        let file = self.records.save(date, &holidays)?;

        info!(
            %date,
            records = holidays.len(),
            illustrated = holidays.iter().filter(|h| h.image_path.is_some()).count(),
            file = %file.display(),
            "Daily run finished"
        );
        Ok(holidays)
    }

    /// Drop every gallery folder and record file that is not `today`'s.
    pub fn clean(&self, today: NaiveDate) -> Result<CleanReport, ApiError> {
        let report = CleanReport {
            gallery_folders: self.gallery.clean(today)?,
            record_files: self.records.clean(today)?,
        };
        info!(
            gallery_folders = report.gallery_folders,
            record_files = report.record_files,
            "Cleaned old data"
        );
        Ok(report)
    }
}
