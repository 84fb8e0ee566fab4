//! CLI output: error mapping and plain-text rendering of command results.

use crate::error::ApiError;
use crate::pipeline::BatchSummary;
use crate::storage::Holiday;
use rand::Rng;
use std::path::PathBuf;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ProviderNotConfigured(msg) => format!(
            "{}\nSet generator.api_key in config or the backend's token variable.",
            msg
        ),
        other => other.to_string(),
    }
}

/// One caption per holiday, followed by its image path when there is one.
pub fn format_holidays<R: Rng>(holidays: &[Holiday], rng: &mut R) -> String {
    if holidays.is_empty() {
        return "No holidays for this day".to_string();
    }
    let mut lines = Vec::with_capacity(holidays.len() * 2);
    for holiday in holidays {
        lines.push(holiday.caption(rng));
        match &holiday.image_path {
            Some(path) => lines.push(format!("  image: {}", path.display())),
            None => lines.push("  image: none".to_string()),
        }
    }
    lines.join("\n")
}

pub fn format_generate_report(summary: &BatchSummary, paths: &[Option<PathBuf>]) -> String {
    let mut lines: Vec<String> = paths
        .iter()
        .enumerate()
        .map(|(index, path)| match path {
            Some(path) => format!("[{}] {}", index, path.display()),
            None => format!("[{}] no image", index),
        })
        .collect();
    lines.push(format!(
        "generated {}/{} in {} round(s){}",
        summary.generated,
        summary.prompts,
        summary.rounds,
        if summary.deadline_hit { ", deadline reached" } else { "" }
    ));
    lines.join("\n")
}
