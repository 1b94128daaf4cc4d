//! Peer HTTP Client
//!
//! Outbound calls from one storage node to another. Single entry forwards
//! get one try; bulk chunk transfers get three, since losing a whole chunk
//! is far more expensive than losing one forwarded write.

use crate::cluster::types::{Chunk, Entry};
use crate::error::{Error, Result};

use std::time::Duration;

/// One attempt, no retry. Used for fire-and-forget entry forwards.
pub const SINGLE_TRY: usize = 1;
/// Three attempts with backoff. Used for chunk shipping and catchup pulls.
pub const THREE_TRIES: usize = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
}

impl Default for NodeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Forwards a single entry to a peer's local-only write endpoint.
    pub async fn send_entry(&self, addr: &str, entry: &Entry, attempts: usize) -> Result<()> {
        let response = self
            .post_with_retry(
                format!("{}/internal/set", addr),
                &[("key", entry.key.as_str()), ("value", entry.value.as_str())],
                attempts,
            )
            .await?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "peer {} rejected entry: {}",
                addr,
                response.status()
            )));
        }

        Ok(())
    }

    /// Ships a rehash chunk to the peer it now belongs to.
    pub async fn send_chunk(&self, addr: &str, chunk: &Chunk, attempts: usize) -> Result<()> {
        let response = self
            .post_json_with_retry(format!("{}/internal/setchunk", addr), chunk, attempts)
            .await?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "peer {} rejected chunk: {}",
                addr,
                response.status()
            )));
        }

        Ok(())
    }

    /// Reads a single key from a peer's local store. `Ok(None)` means the
    /// peer answered but does not hold the key; the caller moves on to the
    /// next replica on any error.
    pub async fn fetch_entry(&self, addr: &str, key: &str) -> Result<Option<Entry>> {
        let response = self
            .http
            .get(format!("{}/internal/get", addr))
            .query(&[("key", key)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "peer {} answered {}",
                addr,
                response.status()
            )));
        }

        Ok(Some(response.json::<Entry>().await?))
    }

    /// Downloads a peer's full local chunk.
    pub async fn fetch_chunk(&self, addr: &str, attempts: usize) -> Result<Chunk> {
        let response = self
            .get_with_retry(format!("{}/internal/getall", addr), attempts)
            .await?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "peer {} answered {}",
                addr,
                response.status()
            )));
        }

        Ok(response.json::<Chunk>().await?)
    }

    async fn post_with_retry(
        &self,
        url: String,
        query: &[(&str, &str)],
        attempts: usize,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http
                .post(&url)
                .query(query)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(e.into());
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(Error::Transport("retry attempts exhausted".to_string()))
    }

    async fn post_json_with_retry<T: serde::Serialize>(
        &self,
        url: String,
        payload: &T,
        attempts: usize,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http
                .post(&url)
                .json(payload)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(e.into());
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(Error::Transport("retry attempts exhausted".to_string()))
    }

    async fn get_with_retry(&self, url: String, attempts: usize) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self.http.get(&url).timeout(REQUEST_TIMEOUT).send().await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(e.into());
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(Error::Transport("retry attempts exhausted".to_string()))
    }
}
