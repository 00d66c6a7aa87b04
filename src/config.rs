use crate::connection::ProducerAccessMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default batch size in messages
const DEFAULT_BATCH_SIZE: usize = 100;
/// Default flush interval for partially filled batches
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
/// Default broker re-verification interval
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Default backoff held on abnormal exit
const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(3);

const MIN_BATCH_SIZE: usize = 1;
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
const MAX_TERMINATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-scope configuration shared by every producer in the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bootstrap broker list (host:port)
    pub brokers: Vec<String>,

    /// HTTP admin port used for topic lookups
    pub admin_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:6650".to_string()],
            admin_port: 8080,
        }
    }
}

impl ClientConfig {
    pub fn new(brokers: Vec<String>, admin_port: u16) -> Self {
        Self {
            brokers,
            admin_port,
        }
    }
}

/// Per-producer construction options.
///
/// Out-of-range values are clamped rather than rejected: `batch_size` and the
/// intervals have floors, `termination_timeout` has a 5 s ceiling.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Requested producer name; the broker assigns one when absent
    pub producer_name: Option<String>,
    /// Requested access mode, recorded from the server reply
    pub access_mode: ProducerAccessMode,
    /// Opaque metadata forwarded to the broker with the registration
    pub properties: HashMap<String, String>,
    /// Coalesce publishes into server-side batches
    pub batch_enabled: bool,
    /// Queue length that triggers a batch dispatch
    pub batch_size: usize,
    /// Upper bound on how long a partial batch may wait
    pub flush_interval: Duration,
    /// How often the owning broker is re-verified (jitter is added on top)
    pub refresh_interval: Duration,
    /// How long an abnormally exiting actor holds its slot before releasing
    pub termination_timeout: Duration,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            producer_name: None,
            access_mode: ProducerAccessMode::default(),
            properties: HashMap::new(),
            batch_enabled: false,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
        }
    }
}

impl ProducerOptions {
    /// Create a new builder
    pub fn builder() -> ProducerOptionsBuilder {
        ProducerOptionsBuilder::default()
    }

    /// Apply the documented floors and ceiling.
    pub(crate) fn clamped(mut self) -> Self {
        self.batch_size = self.batch_size.max(MIN_BATCH_SIZE);
        self.flush_interval = self.flush_interval.max(MIN_FLUSH_INTERVAL);
        self.refresh_interval = self.refresh_interval.max(MIN_REFRESH_INTERVAL);
        self.termination_timeout = self.termination_timeout.min(MAX_TERMINATION_TIMEOUT);
        self
    }
}

/// Builder for ProducerOptions
#[derive(Default)]
pub struct ProducerOptionsBuilder {
    options: ProducerOptions,
}

impl ProducerOptionsBuilder {
    /// Set the requested producer name
    pub fn producer_name(mut self, name: impl Into<String>) -> Self {
        self.options.producer_name = Some(name.into());
        self
    }

    /// Set the requested access mode
    pub fn access_mode(mut self, mode: ProducerAccessMode) -> Self {
        self.options.access_mode = mode;
        self
    }

    /// Attach a metadata property forwarded to the broker
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.properties.insert(key.into(), value.into());
        self
    }

    /// Enable or disable batching
    pub fn batch_enabled(mut self, enabled: bool) -> Self {
        self.options.batch_enabled = enabled;
        self
    }

    /// Set the batch size trigger (floor: 1)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.options.batch_size = size;
        self
    }

    /// Set the flush interval (floor: 100 ms)
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.options.flush_interval = interval;
        self
    }

    /// Set the broker refresh interval (floor: 10 s)
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.options.refresh_interval = interval;
        self
    }

    /// Set the abnormal-exit backoff (ceiling: 5 s)
    pub fn termination_timeout(mut self, timeout: Duration) -> Self {
        self.options.termination_timeout = timeout;
        self
    }

    /// Build the options
    pub fn build(self) -> ProducerOptions {
        self.options
    }
}
