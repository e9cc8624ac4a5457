//! Provider HTTP Client - Rate-limit-aware REST Gateway
//!
//! Implements the `RpcGateway` port against a custodial provider's REST
//! API using reqwest, with API-key authentication, bounded retries with
//! exponential backoff, and 429 handling.
//!
//! Network-level retries here are orthogonal to the call queue's spacing
//! rule: the queue decides WHEN a gateway call starts, this client decides
//! how stubbornly one call survives transient failures.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ChainConfig;
use crate::ports::rpc_gateway::{BroadcastAck, ProviderTxRecord, RpcGateway, TransferRequest};

/// Configuration for the provider HTTP client.
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
  /// Base URL for the provider API.
  pub base_url: String,
  /// Provider API key, if required.
  pub api_key: Option<String>,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
}

impl RpcClientConfig {
  /// Derive client settings from a chain's config section.
  pub fn from_chain(chain: &ChainConfig) -> Self {
    Self {
      base_url: chain.rpc_url.clone(),
      api_key: chain.api_key.clone(),
      timeout: Duration::from_millis(chain.request_timeout_ms),
      max_retries: chain.max_retries,
      retry_base_delay: Duration::from_millis(200),
    }
  }
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
  #[serde(default)]
  transactions: Vec<ProviderTxRecord>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
  balance: String,
}

#[derive(Debug, Serialize)]
struct TransferBody<'a> {
  signing_key: &'a str,
  to_address: &'a str,
  /// Base units as a string; JSON numbers lose precision past 2^53.
  amount: String,
  memo: &'a str,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
  accepted: bool,
  message: Option<String>,
}

/// REST gateway to one chain's custodial provider.
pub struct HttpRpcGateway {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: RpcClientConfig,
}

impl HttpRpcGateway {
  /// Create a new provider gateway.
  pub fn new(config: RpcClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self { http, config })
  }

  fn get(&self, path: &str) -> RequestBuilder {
    self.with_auth(self.http.get(format!("{}{}", self.config.base_url, path)))
  }

  fn post_json<B: Serialize>(&self, path: &str, body: &B) -> RequestBuilder {
    self.with_auth(
      self
        .http
        .post(format!("{}{}", self.config.base_url, path))
        .json(body),
    )
  }

  fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.config.api_key {
      Some(key) => request.header("X-API-KEY", key),
      None => request,
    }
  }

  /// Execute a request with bounded retries and 429 backoff.
  async fn execute_with_retry(&self, request: RequestBuilder, path: &str) -> Result<Response> {
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, path, "Retrying provider request");
        sleep(delay).await;
      }

      let req = request
        .try_clone()
        .context("Failed to clone provider request")?;

      match req.send().await {
        Ok(response) => match response.status() {
          StatusCode::OK | StatusCode::CREATED => return Ok(response),
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(path, "Rate limited by provider, backing off");
            sleep(Duration::from_secs(2)).await;
            last_error = Some(anyhow::anyhow!("Rate limited"));
            continue;
          }
          status if status.is_server_error() => {
            warn!(path, status = %status, "Provider server error, retrying");
            last_error = Some(anyhow::anyhow!("Provider server error: {status}"));
            continue;
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Provider error {status}: {body}"));
          }
        },
        Err(e) => {
          warn!(path, error = %e, attempt, "Provider request failed");
          last_error = Some(e.into());
          continue;
        }
      }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
  }
}

#[async_trait]
impl RpcGateway for HttpRpcGateway {
  async fn recent_transactions(
    &self,
    address: &str,
    limit: usize,
  ) -> Result<Vec<ProviderTxRecord>> {
    let path = format!("/v1/accounts/{address}/transactions?limit={limit}");
    let response = self.execute_with_retry(self.get(&path), &path).await?;

    let page: TransactionsResponse = response
      .json()
      .await
      .context("Failed to decode transaction page")?;
    Ok(page.transactions)
  }

  async fn balance(&self, address: &str) -> Result<u128> {
    let path = format!("/v1/accounts/{address}/balance");
    let response = self.execute_with_retry(self.get(&path), &path).await?;

    let body: BalanceResponse = response
      .json()
      .await
      .context("Failed to decode balance response")?;
    body
      .balance
      .trim()
      .parse::<u128>()
      .with_context(|| format!("Provider returned unparseable balance '{}'", body.balance))
  }

  async fn broadcast_transfer(&self, transfer: &TransferRequest) -> Result<BroadcastAck> {
    let body = TransferBody {
      signing_key: &transfer.signing_key,
      to_address: &transfer.to_address,
      amount: transfer.amount_base.to_string(),
      memo: &transfer.memo,
    };

    let path = "/v1/transfers";
    let response = self
      .execute_with_retry(self.post_json(path, &body), path)
      .await?;

    let ack: TransferResponse = response
      .json()
      .await
      .context("Failed to decode broadcast response")?;
    Ok(BroadcastAck {
      accepted: ack.accepted,
      provider_message: ack.message,
    })
  }

  async fn is_healthy(&self) -> bool {
    matches!(
      self.get("/v1/ping").send().await,
      Ok(r) if r.status().is_success()
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_config_from_chain_section() {
    let toml_str = r#"
      name = "bsc"
      rpc_url = "https://provider.example/api"
      api_key = "secret"
      decimals = 18
      request_timeout_ms = 5000
      max_retries = 2
    "#;
    let chain: ChainConfig = toml::from_str(toml_str).unwrap();
    let config = RpcClientConfig::from_chain(&chain);

    assert_eq!(config.base_url, "https://provider.example/api");
    assert_eq!(config.api_key.as_deref(), Some("secret"));
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.max_retries, 2);
  }

  #[test]
  fn test_transfer_body_serializes_amount_as_string() {
    let body = TransferBody {
      signing_key: "key",
      to_address: "addr",
      amount: u128::MAX.to_string(),
      memo: "wd-1-2",
    };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["amount"], u128::MAX.to_string());
  }
}
