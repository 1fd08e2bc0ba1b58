use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("client error HTTP {status} from {url}: {body}")]
    Client { url: String, status: u16, body: String },

    #[error("invalid JSON from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network { .. } | FetchError::Status { .. })
    }
}

/// Keep error bodies short enough for a log line.
pub(crate) fn snippet(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_CHARS).collect();
    out.push('…');
    out
}
