//! # pulsar-client
//!
//! Async client core for [Apache Pulsar](https://pulsar.apache.org/)
//! partitioned topics: one lightweight actor per topic partition that
//! accepts publish requests, optionally coalesces them into server-side
//! batches, and keeps the partition bound to the broker that currently owns
//! it.
//!
//! ## Features
//!
//! - **Actor per partition**: lock-free sequence assignment and strict
//!   per-partition FIFO, built on a Tokio task owning a command channel
//! - **Cooperative batching**: size trigger plus a flush-interval bound on
//!   how long a partial batch may wait
//! - **Broker binding**: HTTP admin lookup at start and jittered periodic
//!   re-verification; a moved topic fails fast so the owner can rebind
//! - **Sync and async publishes**: blocking sends await the broker receipt,
//!   fire-and-forget sends return as soon as the command is queued
//! - **Fast-fail shutdown**: queued publishes are failed with
//!   [`Error::Closed`] and abnormal exits back off before releasing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pulsar_client::{
//!     ClientConfig, HttpLookup, PartitionProducer, ProducerOptions, SendOptions, Topic,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(connections: Arc<dyn pulsar_client::ConnectionManager>)
//! # -> pulsar_client::Result<()> {
//! let lookup = Arc::new(HttpLookup::new(ClientConfig::default()));
//!
//! let options = ProducerOptions::builder()
//!     .batch_enabled(true)
//!     .batch_size(100)
//!     .flush_interval(Duration::from_millis(100))
//!     .build();
//!
//! let topic = Topic::parse("persistent://acme/orders/created")?.with_partition(3);
//! let producer = PartitionProducer::create(lookup, connections, topic, options).await?;
//!
//! // Blocking publish: waits for the broker receipt.
//! let id = producer.send("hello", SendOptions::new()).await?;
//!
//! // Fire-and-forget, deferred by five seconds.
//! producer
//!     .send_async("later", SendOptions::new().with_delay(Duration::from_secs(5)))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod batch;
pub mod config;
pub mod connection;
pub mod error;
pub mod lookup;
pub mod message;
pub mod producer;
pub mod topic;

pub use config::{ClientConfig, ProducerOptions, ProducerOptionsBuilder};
pub use connection::{
    Connection, ConnectionEvent, ConnectionManager, ProducerAccessMode, ProducerRegistration,
};
pub use error::{Error, Result};
pub use lookup::{HttpLookup, LookupService};
pub use message::{MessageId, ProducerMessage, SendOptions};
pub use producer::{ExitReason, PartitionProducer};
pub use topic::Topic;
