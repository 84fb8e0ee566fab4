//! Daily records: which titles were generated for a day and where their
//! images live. One JSON file per day, `<records>/<dd-mm-yy>.json`.

use crate::error::StorageError;
use crate::gallery::day_key;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const EMOJI: &[&str] = &[
    "💝", "💛", "💯", "🎁", "🎈", "🎉", "🎊", "💐", "🌹", "🌺", "🥳", "🤪", "🤗",
];
/// Each emoji may repeat up to this many times in one caption.
const EMOJI_REPEATS: usize = 3;

/// A holiday title and its illustration, if one was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub title: String,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
}

impl Holiday {
    pub fn new(title: impl Into<String>, image_path: Option<PathBuf>) -> Self {
        Self {
            title: title.into(),
            image_path,
        }
    }

    /// Celebratory caption: the title, 3 to 6 `!`, a space, 5 to 8 emoji.
    pub fn caption<R: Rng>(&self, rng: &mut R) -> String {
        let bangs = "!".repeat(rng.gen_range(3..=6));
        let pool: Vec<&str> = EMOJI
            .iter()
            .flat_map(|e| std::iter::repeat(*e).take(EMOJI_REPEATS))
            .collect();
        let count = rng.gen_range(5..=8);
        let emoji: String = pool.choose_multiple(rng, count).copied().collect();
        format!("{}{} {}", self.title, bangs, emoji)
    }
}

pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.path.join(format!("{}.json", day_key(date)))
    }

    pub fn exists(&self, date: NaiveDate) -> bool {
        self.file_for(date).is_file()
    }

    pub fn load(&self, date: NaiveDate) -> Result<Vec<Holiday>, StorageError> {
        let file = self.file_for(date);
        if !file.is_file() {
            return Err(StorageError::NotFound(file));
        }
        let content = std::fs::read_to_string(&file)?;
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", file.display(), e))
        })
    }

    /// Write the day's records, replacing any previous file.
    pub fn save(&self, date: NaiveDate, holidays: &[Holiday]) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.path)?;
        let file = self.file_for(date);
        let content = serde_json::to_string_pretty(holidays)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Atomic replace through a sibling temp file.
        let tmp = file.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &file)?;
        debug!(path = %file.display(), records = holidays.len(), "Saved daily records");
        Ok(file)
    }

    /// Remove every record file except `today`'s.
    pub fn clean(&self, today: NaiveDate) -> Result<usize, StorageError> {
        if !self.path.is_dir() {
            return Ok(0);
        }
        let keep = self.file_for(today);
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            let is_record = path.extension().and_then(|e| e.to_str()) == Some("json");
            if !is_record || !path.is_file() || path == keep {
                continue;
            }
            std::fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}
