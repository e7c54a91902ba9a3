//! Blocking GitHub contents-API client.

use std::io;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use shelf_core::{RepoPath, SyncConfig};
use shelf_sync::{RemoteError, RemoteRepository};

use crate::status::{classify, error_message, Operation, RateLimitHeaders};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";

#[derive(Deserialize)]
struct ContentEntry {
    sha: String,
}

#[derive(Deserialize)]
struct PutResponse {
    content: ContentEntry,
}

/// [`RemoteRepository`] backed by one GitHub repository and branch.
#[derive(Clone)]
pub struct GitHubClient {
    agent: ureq::Agent,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    branch: String,
    private: bool,
}

impl GitHubClient {
    pub fn new(config: &SyncConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout())
            .user_agent(&user_agent())
            .build();
        Self {
            agent,
            api_base: DEFAULT_API_BASE.to_string(),
            token: config.github_token.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            private: config.create_private,
        }
    }

    /// Point the client at another API root (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo)
        )
    }

    /// Contents URL for `path`, each segment percent-encoded.
    pub fn contents_url(&self, path: &RepoPath) -> String {
        let encoded: Vec<_> = path
            .as_str()
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/contents/{}", self.repo_url(), encoded.join("/"))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", ACCEPT)
            .set("X-GitHub-Api-Version", API_VERSION)
    }

    fn create_repository(&self) -> Result<(), RemoteError> {
        let url = format!("{}/user/repos", self.api_base);
        let payload = json!({
            "name": self.repo,
            "private": self.private,
            "auto_init": true,
        });
        self.request("POST", &url)
            .send_json(payload)
            .map_err(|e| into_remote(e, Operation::CreateRepository))?;
        Ok(())
    }
}

impl RemoteRepository for GitHubClient {
    fn ensure_repository(&self) -> Result<bool, RemoteError> {
        match self.request("GET", &self.repo_url()).call() {
            Ok(_) => Ok(false),
            Err(ureq::Error::Status(404, _)) => {
                tracing::info!("repository {}/{} not found; creating", self.owner, self.repo);
                self.create_repository()?;
                Ok(true)
            }
            Err(err) => Err(into_remote(err, Operation::Read)),
        }
    }

    fn current_hash(&self, path: &RepoPath) -> Result<Option<String>, RemoteError> {
        let resp = self
            .request("GET", &self.contents_url(path))
            .query("ref", &self.branch)
            .call();
        match resp {
            Ok(resp) => decode::<ContentEntry>(resp).map(|entry| Some(entry.sha)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(err) => Err(into_remote(err, Operation::Read)),
        }
    }

    fn put_file(
        &self,
        path: &RepoPath,
        content: &[u8],
        previous: Option<&str>,
        message: &str,
    ) -> Result<String, RemoteError> {
        let payload = put_payload(content, previous, message, &self.branch);
        let resp = self
            .request("PUT", &self.contents_url(path))
            .send_json(payload)
            .map_err(|e| into_remote(e, Operation::Write))?;
        decode::<PutResponse>(resp).map(|r| r.content.sha)
    }
}

pub fn user_agent() -> String {
    format!("shelf/{}", env!("CARGO_PKG_VERSION"))
}

/// Body of a contents-API PUT. `sha` is present only for updates.
pub fn put_payload(
    content: &[u8],
    previous: Option<&str>,
    message: &str,
    branch: &str,
) -> serde_json::Value {
    let mut payload = json!({
        "message": message,
        "content": STANDARD.encode(content),
        "branch": branch,
    });
    if let Some(sha) = previous {
        payload["sha"] = json!(sha);
    }
    payload
}

fn decode<T: DeserializeOwned>(resp: ureq::Response) -> Result<T, RemoteError> {
    let status = resp.status();
    resp.into_json::<T>().map_err(|err| {
        if is_timeout(&err) {
            RemoteError::Timeout(err.to_string())
        } else {
            RemoteError::Api {
                status,
                message: format!("unexpected response body: {err}"),
            }
        }
    })
}

fn into_remote(err: ureq::Error, op: Operation) -> RemoteError {
    match err {
        ureq::Error::Status(status, resp) => {
            let headers = RateLimitHeaders::from_response(&resp);
            let body = resp.into_string().unwrap_or_default();
            classify(
                status,
                op,
                &headers,
                error_message(&body),
                chrono::Utc::now().timestamp(),
            )
        }
        ureq::Error::Transport(transport) => {
            let timed_out = std::error::Error::source(&transport)
                .and_then(|source| source.downcast_ref::<io::Error>())
                .is_some_and(is_timeout);
            let message = transport.to_string();
            if timed_out || message.contains("timed out") {
                RemoteError::Timeout(message)
            } else {
                RemoteError::Transport(message)
            }
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
