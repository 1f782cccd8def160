//! Error types for the embedding gateway

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Every variant is a provider failure from the caller's point of view: the build or
/// query that triggered it is abandoned, but the process and any previously published
/// index stay usable. Nothing in this crate retries; callers decide whether to try again.
///
/// # Error Categories
///
/// - **Configuration Errors**: Invalid settings or missing credentials
/// - **Transport Errors**: HTTP failures talking to a remote provider
/// - **Contract Errors**: A provider answered with the wrong number of vectors or
///   with vectors of differing dimension
/// - **Model Errors**: Failures loading or running a local model
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when the provider configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// The environment variable holding the provider API key is unset or empty
    #[error("API key environment variable {var} is not set")]
    MissingApiKey { var: String },

    /// HTTP transport failure (connection, timeout, body decoding)
    #[error("Embedding request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// The remote provider answered with a non-success status
    #[error("Embedding API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider returned a different number of vectors than texts submitted
    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    ResponseLength { expected: usize, actual: usize },

    /// Vectors within one response do not share a dimension
    #[error("Embedding {index} has dimension {actual}, expected {expected}")]
    InconsistentDimensions {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Error during local model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during local embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    pub fn model_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Create an embedding generation error from any error type.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
