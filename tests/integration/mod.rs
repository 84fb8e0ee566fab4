//! Integration tests for the Holicast generation pipeline


mod cli_binary;
mod config_integration;
mod daily_schedule;
mod provider_wiring;
