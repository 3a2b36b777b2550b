//! Engine client for a running gateway.

use std::time::Duration;

use dave_types::{PublicKey, Record};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;

use crate::wire::{encode_b64, ListRequest, ListResponse, RecordEntry, StatusResponse};
use crate::{Engine, EngineError, EngineFuture, PutAck};

/// Timeout applied to every gateway request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the HTTP gateway of a serving node (`dave serve`).
#[derive(Clone)]
pub struct RemoteEngine {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteEngine {
    /// `base_url` is the gateway root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn status(&self) -> Result<StatusResponse, EngineError> {
        let response = self.client.get(self.url("/status")).send().await?;
        decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, EngineError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, EngineError> {
    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::Rejected {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}

impl Engine for RemoteEngine {
    fn put(&self, record: Record) -> Result<PutAck, EngineError> {
        let entry = RecordEntry::try_from(&record)?;
        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        let url = self.url("/put");
        tokio::spawn(async move {
            let result = async {
                let response = client.post(&url).json(&entry).send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(EngineError::Rejected {
                        status: status.as_u16(),
                        message: response.text().await.unwrap_or_default(),
                    })
                }
            }
            .await;
            debug!(key = %entry.key, ok = result.is_ok(), "gateway put finished");
            let _ = tx.send(result);
        });
        Ok(rx)
    }

    fn peer_count(&self) -> EngineFuture<'_, usize> {
        async move { Ok(self.status().await?.peers) }.boxed()
    }

    fn get<'a>(&'a self, public_key: &'a PublicKey, key: &'a str) -> EngineFuture<'a, Option<Record>> {
        async move {
            let records = self.list(public_key, key).await?;
            Ok(records.into_iter().find(|r| r.key == key))
        }
        .boxed()
    }

    fn list<'a>(
        &'a self,
        public_key: &'a PublicKey,
        key_prefix: &'a str,
    ) -> EngineFuture<'a, Vec<Record>> {
        async move {
            let request = ListRequest {
                key_prefix: key_prefix.to_string(),
                pub_key: encode_b64(public_key.as_bytes()),
            };
            let response: ListResponse = self.post("/list", &request).await?;
            response.results.into_iter().map(Record::try_from).collect()
        }
        .boxed()
    }

    fn record_count(&self) -> EngineFuture<'_, usize> {
        async move { Ok(self.status().await?.dats) }.boxed()
    }

    fn kill(&self) -> EngineFuture<'_, ()> {
        // The gateway owns its engine; a client has nothing to stop.
        async move { Ok(()) }.boxed()
    }
}
