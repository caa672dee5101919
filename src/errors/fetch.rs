use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {endpoint} timed out")]
    Timeout {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend {endpoint} answered with HTTP {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid response body from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        let endpoint = endpoint.to_string();
        if err.is_timeout() {
            FetchError::Timeout {
                endpoint,
                source: err,
            }
        } else if err.is_decode() {
            FetchError::Decode {
                endpoint,
                source: err,
            }
        } else {
            FetchError::Transport {
                endpoint,
                source: err,
            }
        }
    }
}
