//! CLI domain: parse, route and output only.
//! No domain orchestration; a single route table dispatches to the daily run,
//! the pipeline and the configuration loader.

mod output;
mod parse;
mod route;

pub use output::{format_generate_report, format_holidays, map_error};
pub use parse::{Cli, Commands};
pub use route::RunContext;
