//! Spot service library
//!
//! Wires configuration, logging and the HTTP API together.

use std::path::PathBuf;

use anyhow::Context as _;
use spot_api::AppState;
use spot_core::AppConfig;
use tracing_subscriber::EnvFilter;

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "SPOT_CONFIG";

/// Config file from the first argument, else `SPOT_CONFIG`, else none
pub fn config_path(args: &[String]) -> Option<PathBuf> {
    args.get(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

/// `RUST_LOG` plus the configured directive, falling back to `info`
pub fn env_filter(config: &AppConfig) -> anyhow::Result<EnvFilter> {
    let directive = config
        .log_filter
        .parse()
        .with_context(|| format!("invalid log filter '{}'", config.log_filter))?;
    Ok(EnvFilter::from_default_env()
        .add_directive(directive)
        .add_directive("info".parse()?))
}

pub fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .init();
    Ok(())
}

/// Run the API server until it fails
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.api_host,
        port = config.api_port,
        vault = %config.protocol.vault_address,
        collection = %config.protocol.collection,
        "Starting Spot"
    );

    let state = AppState::new(config);
    spot_api::start_server(state)
        .await
        .context("API server stopped")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_prefers_argument() {
        let args = vec!["spot".to_string(), "/etc/spot.json".to_string()];
        assert_eq!(config_path(&args), Some(PathBuf::from("/etc/spot.json")));
    }

    #[test]
    fn test_default_config_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.api_port, AppConfig::default().api_port);
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(PathBuf::from("/nonexistent/spot.json"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/spot.json"));
    }

    #[test]
    fn test_env_filter_rejects_bad_directive() {
        let mut config = AppConfig::default();
        assert!(env_filter(&config).is_ok());
        config.log_filter = "spot=notalevel".to_string();
        assert!(env_filter(&config).is_err());
    }
}
