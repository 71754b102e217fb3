// crates/homestead-daemon/src/clients.rs
//
// HTTP clients for the external collaborators.
//
// Endpoints (JSON over HTTP):
//   GET  {chain}/miners           -> ["hotkey", ...]
//   GET  {chain}/block            -> {"block": N}
//   POST {chain}/weights          <- {"epoch_id": "...", "weights": {hotkey: w}}
//   GET  {assignment}/epochs/{id} -> EpochAssignment
//   POST {verifier}/verify        <- Listing, -> {"matches": bool}
//
// Every call goes through `retry_with_backoff`; callers see only the final
// error.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use homestead_core::{
    AssignmentSource, ChainClient, EpochAssignment, HomesteadError, Listing, ListingVerifier,
};

use crate::retry::retry_default;

/// Build the shared reqwest client with a per-request timeout.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn network_err(url: &str, e: reqwest::Error) -> HomesteadError {
    HomesteadError::Network(format!("{}: {}", url, e))
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, HomesteadError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| network_err(url, e))?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(HomesteadError::NotFound(url.to_string()));
    }
    let resp = resp.error_for_status().map_err(|e| network_err(url, e))?;
    resp.json::<T>()
        .await
        .map_err(|e| HomesteadError::Serialization(format!("{}: {}", url, e)))
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    block: u64,
}

#[derive(Debug, Serialize)]
struct WeightsRequest<'a> {
    epoch_id: &'a str,
    weights: &'a BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    matches: bool,
}

/// Chain gateway client.
#[derive(Debug, Clone)]
pub struct HttpChainClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChainClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn registered_miners(&self) -> Result<Vec<String>, HomesteadError> {
        let url = endpoint(&self.base_url, "miners");
        retry_default("registered_miners", || get_json::<Vec<String>>(&self.client, &url)).await
    }

    async fn current_block(&self) -> Result<u64, HomesteadError> {
        let url = endpoint(&self.base_url, "block");
        let resp: BlockResponse =
            retry_default("current_block", || get_json(&self.client, &url)).await?;
        Ok(resp.block)
    }

    async fn publish_weights(
        &self,
        epoch_id: &str,
        weights: &BTreeMap<String, f64>,
    ) -> Result<(), HomesteadError> {
        let url = endpoint(&self.base_url, "weights");
        let body = WeightsRequest { epoch_id, weights };
        retry_default("publish_weights", || async {
            self.client
                .post(&url)
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map(|_| ())
                .map_err(|e| network_err(&url, e))
        })
        .await
    }
}

/// Epoch assignment service client.
#[derive(Debug, Clone)]
pub struct HttpAssignmentClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAssignmentClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl AssignmentSource for HttpAssignmentClient {
    async fn get_epoch_assignment(
        &self,
        epoch_id: &str,
    ) -> Result<EpochAssignment, HomesteadError> {
        let url = endpoint(&self.base_url, &format!("epochs/{}", epoch_id));
        let assignment: EpochAssignment =
            retry_default("get_epoch_assignment", || get_json(&self.client, &url)).await?;
        if assignment.epoch_id != epoch_id {
            return Err(HomesteadError::InvalidInput(format!(
                "Assignment service returned epoch {} for {}",
                assignment.epoch_id, epoch_id
            )));
        }
        Ok(assignment)
    }
}

/// Re-scrape service client used by the tier-3 spot-check.
#[derive(Debug, Clone)]
pub struct HttpListingVerifier {
    base_url: String,
    client: reqwest::Client,
}

impl HttpListingVerifier {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl ListingVerifier for HttpListingVerifier {
    async fn verify(&self, listing: &Listing) -> Result<bool, HomesteadError> {
        let url = endpoint(&self.base_url, "verify");
        let resp: VerifyResponse = retry_default("verify_listing", || async {
            let resp = self
                .client
                .post(&url)
                .json(listing)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| network_err(&url, e))?;
            resp.json::<VerifyResponse>()
                .await
                .map_err(|e| HomesteadError::Serialization(format!("{}: {}", url, e)))
        })
        .await?;
        Ok(resp.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(endpoint("http://h:1/", "/miners"), "http://h:1/miners");
        assert_eq!(endpoint("http://h:1", "epochs/e1"), "http://h:1/epochs/e1");
    }

    #[test]
    fn test_weights_request_shape() {
        let mut weights = BTreeMap::new();
        weights.insert("m1".to_string(), 0.5);
        let body = WeightsRequest {
            epoch_id: "2024-05-01T04-00-00Z",
            weights: &weights,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"epoch_id":"2024-05-01T04-00-00Z","weights":{"m1":0.5}}"#
        );
    }

    #[tokio::test]
    async fn test_unreachable_chain_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let chain = HttpChainClient::new(
            "http://127.0.0.1:9",
            build_http_client(Duration::from_millis(200)),
        );
        let err = chain.current_block().await.unwrap_err();
        assert!(matches!(err, HomesteadError::Network(_)));
    }
}
