//! Error types shared by the backend client, configuration and agent runtime.

/// Failures of the backend session transport. None of them is retried by the client.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("http client build failed: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid backend url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("missing backend credential: {0}")]
    MissingCredential(&'static str),

    #[error("{endpoint} request failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} rejected by backend: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },
}

/// Errors ending the agent's lifecycle task.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AgentError {
    /// Cancellation is the normal shutdown path and must not be reported as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
