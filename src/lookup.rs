//! Broker discovery over the admin REST API.

use crate::config::ClientConfig;
use crate::topic::Topic;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Resolves the broker that currently owns a topic partition.
///
/// Lookups are idempotent and safe to repeat; failures surface as
/// [`Error::LookupFailed`].
#[async_trait]
pub trait LookupService: Send + Sync + 'static {
    /// Returns the owning broker endpoint as `host:port`.
    async fn lookup_topic(&self, topic: &Topic) -> Result<String>;
}

/// Admin-API lookup walking the configured bootstrap brokers in order.
pub struct HttpLookup {
    http: reqwest::Client,
    config: ClientConfig,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(rename = "brokerUrl")]
    broker_url: String,
}

impl HttpLookup {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl LookupService for HttpLookup {
    async fn lookup_topic(&self, topic: &Topic) -> Result<String> {
        let mut last_error = None;

        for broker in &self.config.brokers {
            let host = broker.split(':').next().unwrap_or(broker);
            let url = format!(
                "http://{}:{}/lookup/v2/topic/{}",
                host,
                self.config.admin_port,
                topic.lookup_path()
            );

            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let reply: LookupResponse = response
                        .json()
                        .await
                        .map_err(|e| Error::LookupFailed(e.to_string()))?;
                    let owner = broker_endpoint(&reply.broker_url);
                    debug!(topic = %topic, broker = %owner, "Lookup resolved");
                    return Ok(owner);
                }
                Ok(response) => {
                    warn!(
                        topic = %topic,
                        host = %host,
                        status = %response.status(),
                        "Lookup rejected"
                    );
                    last_error = Some(Error::LookupFailed(format!(
                        "{} returned {}",
                        host,
                        response.status()
                    )));
                }
                Err(e) => {
                    warn!(topic = %topic, host = %host, "Lookup request failed: {}", e);
                    last_error = Some(Error::LookupFailed(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::LookupFailed("no bootstrap brokers configured".to_string())))
    }
}

/// Strip the wire scheme from a broker URL, leaving `host:port`.
fn broker_endpoint(url: &str) -> String {
    url.strip_prefix("pulsar+ssl://")
        .or_else(|| url.strip_prefix("pulsar://"))
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}
