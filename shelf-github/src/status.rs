//! HTTP status classification for GitHub REST responses.

use std::time::Duration;

use serde::Deserialize;
use shelf_sync::RemoteError;

/// Which kind of request produced a response. A few statuses mean different
/// things depending on whether the request was a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    CreateRepository,
}

/// Rate-limit headers captured from a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub remaining: Option<String>,
    pub reset: Option<String>,
    pub retry_after: Option<String>,
}

impl RateLimitHeaders {
    pub fn from_response(resp: &ureq::Response) -> Self {
        let header = |name: &str| resp.header(name).map(|v| v.trim().to_string());
        Self {
            remaining: header("x-ratelimit-remaining"),
            reset: header("x-ratelimit-reset"),
            retry_after: header("retry-after"),
        }
    }

    fn exhausted(&self) -> bool {
        self.remaining.as_deref() == Some("0")
    }

    /// Wait hint: `retry-after` seconds, else the reset epoch minus `now`.
    fn wait_hint(&self, now_epoch: i64) -> Option<Duration> {
        if let Some(secs) = self.retry_after.as_deref().and_then(|v| v.parse::<u64>().ok()) {
            return Some(Duration::from_secs(secs));
        }
        if !self.exhausted() {
            return None;
        }
        let reset = self.reset.as_deref()?.parse::<i64>().ok()?;
        Some(Duration::from_secs(reset.saturating_sub(now_epoch).max(0) as u64))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull `message` out of a GitHub error body, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.len() > 200 {
                let cut = (0..=200).rev().find(|&i| trimmed.is_char_boundary(i)).unwrap_or(0);
                format!("{}…", &trimmed[..cut])
            } else {
                trimmed.to_string()
            }
        }
    }
}

/// Map a non-success status to a [`RemoteError`].
pub fn classify(
    status: u16,
    op: Operation,
    headers: &RateLimitHeaders,
    message: String,
    now_epoch: i64,
) -> RemoteError {
    match status {
        401 => RemoteError::Auth(message),
        403 | 429 if headers.exhausted() || headers.retry_after.is_some() => {
            RemoteError::RateLimited {
                retry_after: headers.wait_hint(now_epoch),
            }
        }
        // Secondary limits sometimes arrive as a bare 429.
        429 => RemoteError::RateLimited { retry_after: None },
        403 => RemoteError::Auth(message),
        409 => RemoteError::Conflict(message),
        422 if op == Operation::Write => RemoteError::Conflict(message),
        404 => RemoteError::NotFound(message),
        502..=504 => RemoteError::Transport(format!("HTTP {status}: {message}")),
        _ => RemoteError::Api { status, message },
    }
}
