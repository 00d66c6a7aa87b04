use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

/// Broker-assigned identifier for an acknowledged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageId {
    pub ledger_id: u64,
    pub entry_id: u64,
    pub partition: i32,
}

/// Per-message options accepted by the publish calls.
///
/// `delay` is a convenience that resolves to an absolute `deliver_at_time`
/// during normalisation; when both are supplied, `delay` wins. Timestamps
/// are UTC epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    /// User-defined properties attached to the message
    pub properties: HashMap<String, String>,
    /// Key used for partition routing by the upstream router
    pub partition_key: Option<String>,
    /// Opaque ordering key
    pub ordering_key: Option<Bytes>,
    /// When the event occurred, as set by the application
    pub event_time: Option<u64>,
    /// Absolute wall-clock time at which consumers should see the message
    pub deliver_at_time: Option<i64>,
    /// Relative form of `deliver_at_time`
    pub delay: Option<Duration>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a user-defined property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the partition key
    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Set the ordering key
    pub fn with_ordering_key(mut self, key: impl Into<Bytes>) -> Self {
        self.ordering_key = Some(key.into());
        self
    }

    /// Set the event time (epoch milliseconds)
    pub fn with_event_time(mut self, event_time: u64) -> Self {
        self.event_time = Some(event_time);
        self
    }

    /// Set an absolute delivery time (epoch milliseconds)
    pub fn with_deliver_at_time(mut self, deliver_at_time: i64) -> Self {
        self.deliver_at_time = Some(deliver_at_time);
        self
    }

    /// Defer delivery by a relative amount; overrides `deliver_at_time`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Resolve `delay` into an absolute `deliver_at_time` anchored at
    /// `now_ms`. Idempotent: a second pass over the result is a no-op.
    pub(crate) fn normalized(mut self, now_ms: i64) -> Self {
        if let Some(delay) = self.delay.take() {
            self.deliver_at_time = Some(now_ms + delay.as_millis() as i64);
        }
        self
    }
}

/// A message fully prepared for the wire, immutable once constructed.
///
/// `sequence_id` is assigned by the owning producer actor and is strictly
/// monotonic within the producer's lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerMessage {
    pub producer_id: u64,
    pub producer_name: String,
    pub sequence_id: u64,
    pub payload: Bytes,
    pub properties: HashMap<String, String>,
    pub partition_key: Option<String>,
    pub ordering_key: Option<Bytes>,
    pub event_time: Option<u64>,
    pub deliver_at_time: Option<i64>,
}

/// Current UTC wall-clock in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
