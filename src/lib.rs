//! Holicast: daily holiday illustrations
//!
//! Turns the day's holiday titles into images through rate-limited,
//! occasionally-censoring text-to-image providers, then stores the
//! (title, image) records for downstream posting.

pub mod cli;
pub mod clock;
pub mod config;
pub mod daily;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod pipeline;
pub mod policy;
pub mod provider;
pub mod schedule;
pub mod scheduler;
pub mod source;
pub mod storage;
pub mod translate;
pub mod types;
