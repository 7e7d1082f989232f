use http::StatusCode;
use thiserror::Error;

/// Fatal problems with an inbound envelope. The eventing engine cannot be
/// told about these, there is no usable event to report an outcome for, so
/// they are logged, counted and dropped.
#[derive(Debug, Error)]
pub enum EventError {
    /// The message body is not a JSON object at all.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    /// `data` is missing, or neither an object nor a JSON-encoded string
    /// holding one.
    #[error("invalid data field: {0}")]
    InvalidDataField(String),

    /// `notif-metadata` is absent, or not an object of the expected shape.
    #[error("envelope data has no usable notif-metadata block")]
    MissingRoutingBlock,

    /// `extras` is present but does not decode to a JSON object.
    #[error("invalid extras field: {0}")]
    InvalidExtras(String),
}

/// Things that go wrong between a decoded event and a 2xx from the
/// collector. Unlike [`EventError`], these are reported back to the engine
/// as a failure outcome.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no target url in notif-metadata")]
    MissingUrl,

    #[error("invalid target url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to serialize delivery body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("error sending request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("received {status} response: {body}")]
    Status { status: StatusCode, body: String },
}

/// Startup-only failures, surfaced once from main and never handled.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
