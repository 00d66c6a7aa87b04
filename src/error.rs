use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Topic lookup failed: {0}")]
    LookupFailed(String),

    #[error("Broker refused producer creation: {0}")]
    CreateProducerFailed(String),

    #[error("Connection to broker lost")]
    ConnectionDown,

    #[error("Topic moved to broker {0}")]
    BrokerChanged(String),

    #[error("Producer closed")]
    Closed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
