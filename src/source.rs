//! Prompt sources: where the day's holiday titles come from.

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::debug;

const TITLE_SEPARATOR: char = '~';

/// Yields the ordered prompt list for a day.
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn prompts_for(&self, date: NaiveDate) -> Result<Vec<String>, ApiError>;
}

/// Reads pre-scraped month files: `<dir>/<MM>_<YYYY>.txt`, one line per day of
/// the month, titles separated by `~`.
pub struct MonthFileSource {
    dir: PathBuf,
}

impl MonthFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{:02}_{}.txt", date.month(), date.year()))
    }
}

/// Titles on the line for `day` (1-based). Missing lines give no titles.
pub(crate) fn parse_day_line(content: &str, day: u32) -> Vec<String> {
    content
        .lines()
        .nth(day.saturating_sub(1) as usize)
        .map(|line| {
            line.split(TITLE_SEPARATOR)
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PromptSource for MonthFileSource {
    async fn prompts_for(&self, date: NaiveDate) -> Result<Vec<String>, ApiError> {
        let file = self.file_for(date);
        let content = std::fs::read_to_string(&file).map_err(|e| {
            ApiError::SourceError(format!(
                "Failed to read holiday file {}: {}",
                file.display(),
                e
            ))
        })?;
        let prompts = parse_day_line(&content, date.day());
        debug!(file = %file.display(), prompts = prompts.len(), "Loaded holiday titles");
        Ok(prompts)
    }
}

/// Fixed list, same for every day.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    prompts: Vec<String>,
}

impl StaticSource {
    pub fn new<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prompts: prompts.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PromptSource for StaticSource {
    async fn prompts_for(&self, _date: NaiveDate) -> Result<Vec<String>, ApiError> {
        Ok(self.prompts.clone())
    }
}
