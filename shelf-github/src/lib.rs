//! GitHub REST implementation of [`shelf_sync::RemoteRepository`].

pub mod client;
pub mod status;

pub use client::{GitHubClient, DEFAULT_API_BASE};
pub use status::{classify, Operation, RateLimitHeaders};
