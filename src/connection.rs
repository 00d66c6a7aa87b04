//! Trait seams for the broker transport.
//!
//! The wire codec and TCP session live behind [`Connection`]; the per-broker
//! pool lives behind [`ConnectionManager`]. A single connection is
//! multiplexed across many producers, keyed by the server-assigned
//! `producer_id`, and is responsible for its own internal concurrency.

use crate::config::ProducerOptions;
use crate::message::{MessageId, ProducerMessage};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// How the broker arbitrates concurrent producers on one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerAccessMode {
    #[default]
    Shared,
    Exclusive,
    WaitForExclusive,
}

/// Server reply to a successful producer registration.
#[derive(Debug, Clone)]
pub struct ProducerRegistration {
    /// Numeric handle for this producer on its connection
    pub producer_id: u64,
    /// Broker-assigned name
    pub producer_name: String,
    /// Access mode granted by the broker
    pub access_mode: ProducerAccessMode,
    /// Highest sequence id the broker has seen for this producer name
    pub last_sequence_id: u64,
    /// Largest payload the broker will accept
    pub max_message_size: usize,
    /// Server-returned metadata
    pub properties: HashMap<String, String>,
}

/// Why a connection stopped serving its producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The transport died; everything multiplexed over it is gone.
    Dropped,
    /// The broker asked the producers on this connection to wind down.
    CloseRequested,
}

/// A multiplexed broker session shared by many producers and consumers.
///
/// Send failures surface as [`crate::Error::SendFailed`]; registration
/// failures as [`crate::Error::CreateProducerFailed`].
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Register a producer for `topic` on this connection.
    async fn create_producer(
        &self,
        topic: &str,
        options: &ProducerOptions,
    ) -> Result<ProducerRegistration>;

    /// Ship a single message; one receipt per message.
    async fn send_message(&self, message: ProducerMessage) -> Result<MessageId>;

    /// Ship a batch in one round trip. The single receipt covers every
    /// message in the batch.
    async fn send_messages(&self, messages: Vec<ProducerMessage>) -> Result<MessageId>;

    /// Resolves once the connection stops serving traffic.
    ///
    /// Must be cancel-safe: callers re-await this on every event-loop turn.
    async fn closed(&self) -> ConnectionEvent;
}

/// Per-broker connection pool.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    /// Check out a live connection to `broker` (`host:port`).
    async fn get_connection(&self, broker: &str) -> Result<Arc<dyn Connection>>;
}
