//! Integration tests for the layered configuration system

use super::test_utils::with_isolated_env;
use holicast::config::{BackendKind, ConfigLoader, HolicastConfig};
use holicast::error::ApiError;
use holicast::provider::BackendFactory;
use std::time::Duration;
use tempfile::TempDir;

fn write_workspace_config(root: &std::path::Path, name: &str, content: &str) {
    let dir = root.join("config");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = with_isolated_env(&temp_dir, || ConfigLoader::load(temp_dir.path()).unwrap());

    assert_eq!(config.generator.backend, BackendKind::FusionBrain);
    assert_eq!(config.pipeline.rounds, 1);
    assert_eq!(config.storage.root, temp_dir.path());
    assert_eq!(
        config.generator.rate_budget().per_request_delay(),
        Duration::from_secs(13)
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_environment_file_overrides_base_file() {
    let temp_dir = TempDir::new().unwrap();
    write_workspace_config(
        temp_dir.path(),
        "config.toml",
        r#"
[generator]
width = 640
height = 640
soft_prompt = "Balloons"
"#,
    );
    write_workspace_config(
        temp_dir.path(),
        "production.toml",
        r#"
[generator]
width = 1024
"#,
    );

    let config = with_isolated_env(&temp_dir, || {
        std::env::set_var("HOLICAST_ENV", "production");
        ConfigLoader::load(temp_dir.path()).unwrap()
    });

    assert_eq!(config.generator.width, 1024);
    assert_eq!(config.generator.height, 640);
    assert_eq!(config.generator.soft_prompt, "Balloons");
}

#[test]
fn test_environment_variables_win_over_files() {
    let temp_dir = TempDir::new().unwrap();
    write_workspace_config(
        temp_dir.path(),
        "config.toml",
        r#"
[pipeline]
rounds = 2
"#,
    );

    let config = with_isolated_env(&temp_dir, || {
        std::env::set_var("HOLICAST__PIPELINE__ROUNDS", "4");
        let loaded = ConfigLoader::load(temp_dir.path());
        std::env::remove_var("HOLICAST__PIPELINE__ROUNDS");
        loaded.unwrap()
    });

    assert_eq!(config.pipeline.rounds, 4);
}

#[test]
fn test_user_level_file_is_layered_below_workspace() {
    let temp_dir = TempDir::new().unwrap();
    write_workspace_config(
        temp_dir.path(),
        "config.toml",
        r#"
[generator]
max_poll_attempts = 10
"#,
    );

    let config = with_isolated_env(&temp_dir, || {
        let global = ConfigLoader::global_config_path().unwrap();
        std::fs::create_dir_all(global.parent().unwrap()).unwrap();
        std::fs::write(
            &global,
            r#"
[generator]
max_poll_attempts = 99
target_language = "de"
"#,
        )
        .unwrap();
        ConfigLoader::load(temp_dir.path()).unwrap()
    });

    assert_eq!(config.generator.max_poll_attempts, 10);
    assert_eq!(config.generator.target_language, "de");
}

#[test]
fn test_invalid_values_are_collected() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("bad.toml");
    std::fs::write(
        &file,
        r#"
[generator]
requests_per_minute = 0

[pipeline]
rounds = 0

[storage]
image_extension = ""
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&file).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(matches!(config.validated(), Err(ApiError::ConfigError(_))));
}

#[test]
fn test_infinite_delay_margin_fails_validation() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("inf.toml");
    std::fs::write(
        &file,
        r#"
[generator]
delay_margin_secs = inf
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&file).unwrap();
    assert!(config.generator.delay_margin_secs.is_infinite());
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("delay_margin_secs"));
}

#[test]
fn test_keyed_backend_without_key_is_not_configured() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = HolicastConfig::default();
    config.generator.backend = BackendKind::OpenAi;

    let result = with_isolated_env(&temp_dir, || {
        let saved = std::env::var("HOLICAST_OPENAI_TOKEN").ok();
        std::env::remove_var("HOLICAST_OPENAI_TOKEN");
        let result = BackendFactory::create(&config.generator).map(|b| b.name().to_string());
        if let Some(value) = saved {
            std::env::set_var("HOLICAST_OPENAI_TOKEN", value);
        }
        result
    });

    assert!(matches!(result, Err(ApiError::ProviderNotConfigured(_))));
}

#[test]
fn test_factory_builds_configured_backend() {
    let mut config = HolicastConfig::default();
    config.generator.backend = BackendKind::HuggingFace;
    config.generator.api_key = Some("hf_test".to_string());
    let backend = BackendFactory::create(&config.generator).unwrap();
    assert_eq!(backend.name(), "hugging_face");
    assert!(backend.poll_is_request());
    assert_eq!(config.generator.rate_budget().requests_per_minute, 3);

    let default_backend = BackendFactory::create(&HolicastConfig::default().generator).unwrap();
    assert_eq!(default_backend.name(), "fusion_brain");
}
