//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    service = %config.service.name,
    chains = config.chains.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - At least one chain, with unique names
/// - Non-empty endpoints and sane decimals
/// - Positive timing and retry budgets
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.is_empty(),
    "service.name must not be empty"
  );
  anyhow::ensure!(
    !config.chains.is_empty(),
    "At least one chain must be configured"
  );

  let mut names = HashSet::new();
  for (i, chain) in config.chains.iter().enumerate() {
    anyhow::ensure!(
      !chain.name.is_empty(),
      "Chain {} has an empty name",
      i
    );
    anyhow::ensure!(
      names.insert(chain.name.as_str()),
      "Duplicate chain name: {}",
      chain.name
    );
    anyhow::ensure!(
      !chain.rpc_url.is_empty(),
      "Chain {} has an empty rpc_url",
      chain.name
    );
    // rust_decimal cannot represent scales beyond 28
    anyhow::ensure!(
      chain.decimals <= 28,
      "Chain {} decimals must be at most 28, got {}",
      chain.name,
      chain.decimals
    );
    anyhow::ensure!(
      chain.min_call_spacing_ms > 0,
      "Chain {} min_call_spacing_ms must be positive",
      chain.name
    );
    anyhow::ensure!(
      chain.deposit_poll_interval_ms > 0,
      "Chain {} deposit_poll_interval_ms must be positive",
      chain.name
    );
    anyhow::ensure!(
      chain.tx_page_limit > 0,
      "Chain {} tx_page_limit must be positive",
      chain.name
    );
    anyhow::ensure!(
      chain.confirm_attempts > 0,
      "Chain {} confirm_attempts must be positive",
      chain.name
    );
    anyhow::ensure!(
      chain.processed_cache_size > 0,
      "Chain {} processed_cache_size must be positive",
      chain.name
    );

    for target in &chain.watch {
      anyhow::ensure!(
        !target.wallet_id.is_empty() && !target.address.is_empty(),
        "Chain {} has a watch target with empty wallet_id or address",
        chain.name
      );
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const MINIMAL: &str = r#"
    [service]
    name = "chain-connector"

    [ledger]

    [metrics]

    [[chains]]
    name = "bsc"
    rpc_url = "https://provider.example/api"
    decimals = 18
  "#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_parses_with_defaults() {
    let config: AppConfig = toml::from_str(MINIMAL).unwrap();
    validate_config(&config).unwrap();

    let chain = &config.chains[0];
    assert_eq!(chain.min_call_spacing_ms, 1_000);
    assert_eq!(chain.deposit_poll_interval_ms, 60_000);
    assert_eq!(chain.confirm_attempts, 10);
    assert_eq!(chain.confirm_delay_ms, 10_000);
    assert!(chain.watch.is_empty());
  }

  #[test]
  fn test_rejects_excessive_decimals() {
    let toml_str = MINIMAL.replace("decimals = 18", "decimals = 40");
    let config: AppConfig = toml::from_str(&toml_str).unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_rejects_duplicate_chain_names() {
    let mut doubled = MINIMAL.to_string();
    doubled.push_str(
      r#"
      [[chains]]
      name = "bsc"
      rpc_url = "https://other.example/api"
      decimals = 8
    "#,
    );
    let config: AppConfig = toml::from_str(&doubled).unwrap();
    assert!(validate_config(&config).is_err());
  }
}
