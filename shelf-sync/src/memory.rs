//! In-memory [`RemoteRepository`] used by tests and dry wiring.
//!
//! Behaves like a conditional-write content store: identifiers are the
//! SHA-256 of the stored bytes, creates fail on existing paths, and updates
//! fail when `previous` no longer matches. Failures can be scripted per path.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use shelf_core::RepoPath;

use crate::cache::fingerprint_of;
use crate::remote::{RemoteError, RemoteRepository};

/// A call observed by [`MemoryRemote`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    EnsureRepository,
    CurrentHash(String),
    PutFile {
        path: String,
        previous: Option<String>,
        message: String,
    },
}

#[derive(Debug, Default)]
struct State {
    exists: bool,
    files: BTreeMap<String, Vec<u8>>,
    calls: Vec<RemoteCall>,
    ensure_failures: VecDeque<RemoteError>,
    get_failures: HashMap<String, VecDeque<RemoteError>>,
    put_failures: HashMap<String, VecDeque<RemoteError>>,
}

#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    /// A remote whose repository already exists and is empty.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                exists: true,
                ..State::default()
            }),
        }
    }

    /// A remote where `ensure_repository` has to create the repository.
    pub fn without_repository() -> Self {
        Self::default()
    }

    /// Seed a file, as if it had been pushed by someone else.
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.set_content(path, content);
        self
    }

    /// Overwrite a file out of band.
    pub fn set_content(&self, path: &str, content: &[u8]) {
        self.lock().files.insert(path.to_string(), content.to_vec());
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn repository_exists(&self) -> bool {
        self.lock().exists
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Paths passed to `put_file`, in call order.
    pub fn put_paths(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RemoteCall::PutFile { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Queue one failure for the next `ensure_repository` call.
    pub fn fail_ensure(&self, err: RemoteError) {
        self.lock().ensure_failures.push_back(err);
    }

    /// Queue one failure for the next `current_hash(path)` call.
    pub fn fail_get(&self, path: &str, err: RemoteError) {
        self.lock()
            .get_failures
            .entry(path.to_string())
            .or_default()
            .push_back(err);
    }

    /// Queue one failure for the next `put_file(path, …)` call.
    pub fn fail_put(&self, path: &str, err: RemoteError) {
        self.lock()
            .put_failures
            .entry(path.to_string())
            .or_default()
            .push_back(err);
    }

    /// Identifier the remote reports for `content`.
    pub fn hash_of(content: &[u8]) -> String {
        fingerprint_of(content).0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteRepository for MemoryRemote {
    fn ensure_repository(&self) -> Result<bool, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::EnsureRepository);
        if let Some(err) = state.ensure_failures.pop_front() {
            return Err(err);
        }
        if state.exists {
            return Ok(false);
        }
        state.exists = true;
        Ok(true)
    }

    fn current_hash(&self, path: &RepoPath) -> Result<Option<String>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::CurrentHash(path.0.clone()));
        if let Some(err) = state
            .get_failures
            .get_mut(path.as_str())
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(state.files.get(path.as_str()).map(|c| Self::hash_of(c)))
    }

    fn put_file(
        &self,
        path: &RepoPath,
        content: &[u8],
        previous: Option<&str>,
        message: &str,
    ) -> Result<String, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::PutFile {
            path: path.0.clone(),
            previous: previous.map(str::to_string),
            message: message.to_string(),
        });
        if let Some(err) = state
            .put_failures
            .get_mut(path.as_str())
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if !state.exists {
            return Err(RemoteError::NotFound("repository".to_string()));
        }

        let current = state.files.get(path.as_str()).map(|c| Self::hash_of(c));
        match (previous, current.as_deref()) {
            (None, Some(_)) => {
                return Err(RemoteError::Conflict(format!("{path} already exists")));
            }
            (Some(expected), Some(actual)) if expected != actual => {
                return Err(RemoteError::Conflict(format!(
                    "{path} is at {actual}, expected {expected}"
                )));
            }
            (Some(expected), None) => {
                return Err(RemoteError::Conflict(format!(
                    "{path} no longer exists, expected {expected}"
                )));
            }
            _ => {}
        }

        state.files.insert(path.0.clone(), content.to_vec());
        Ok(Self::hash_of(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_repository_is_idempotent() {
        let remote = MemoryRemote::without_repository();
        assert_eq!(remote.ensure_repository(), Ok(true));
        assert_eq!(remote.ensure_repository(), Ok(false));
        assert!(remote.repository_exists());
    }

    #[test]
    fn create_then_conditional_update() {
        let remote = MemoryRemote::new();
        let path = RepoPath::from("a.py");
        let v1 = remote.put_file(&path, b"v1", None, "m").unwrap();
        assert_eq!(remote.current_hash(&path), Ok(Some(v1.clone())));

        let v2 = remote.put_file(&path, b"v2", Some(&v1), "m").unwrap();
        assert_ne!(v1, v2);
        assert_eq!(remote.content("a.py"), Some(b"v2".to_vec()));
    }

    #[test]
    fn stale_previous_hash_conflicts() {
        let remote = MemoryRemote::new().with_file("a.py", b"theirs");
        let path = RepoPath::from("a.py");
        let stale = MemoryRemote::hash_of(b"ours");
        let err = remote.put_file(&path, b"new", Some(&stale), "m").unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(_)));
        assert_eq!(remote.content("a.py"), Some(b"theirs".to_vec()));
    }

    #[test]
    fn create_over_existing_conflicts() {
        let remote = MemoryRemote::new().with_file("a.py", b"same");
        let err = remote
            .put_file(&RepoPath::from("a.py"), b"same", None, "m")
            .unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(_)));
    }

    #[test]
    fn scripted_failures_are_consumed_once() {
        let remote = MemoryRemote::new();
        remote.fail_put("a.py", RemoteError::Timeout("slow".into()));
        let path = RepoPath::from("a.py");
        assert!(remote.put_file(&path, b"x", None, "m").is_err());
        assert!(remote.put_file(&path, b"x", None, "m").is_ok());
        assert_eq!(remote.put_paths(), vec!["a.py", "a.py"]);
    }
}
