//! Round-robin rotation over upstream API keys.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ReelError, ReelResult};

/// Fixed, ordered pool of credentials handed out in turn.
///
/// The cursor is owned by the pool, so two pools never share rotation state.
pub struct CredentialPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    pub fn new<I, S>(keys: I) -> ReelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(ReelError::config("credential pool needs at least one key"));
        }
        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Parse a comma- or newline-separated key list.
    pub fn from_list(list: &str) -> ReelResult<Self> {
        Self::new(list.split([',', '\n']))
    }

    /// The next key in rotation; the first call returns the first key.
    pub fn next(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        &self.keys[i]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for CredentialPool {
    // Never print the keys themselves
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("len", &self.keys.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let pool = CredentialPool::new(["a", "b", "c"]).unwrap();
        let got: Vec<&str> = (0..7).map(|_| pool.next()).collect();
        assert_eq!(got, vec!["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn test_independent_pools() {
        let first = CredentialPool::new(["a", "b"]).unwrap();
        let second = CredentialPool::new(["a", "b"]).unwrap();
        assert_eq!(first.next(), "a");
        assert_eq!(second.next(), "a");
    }

    #[test]
    fn test_rejects_empty_pool() {
        assert!(CredentialPool::new(Vec::<String>::new()).is_err());
        assert!(CredentialPool::from_list(" , \n").is_err());
        assert_eq!(CredentialPool::from_list("k1, k2\nk3").unwrap().len(), 3);
    }

    #[test]
    fn test_debug_hides_keys() {
        let pool = CredentialPool::new(["secret"]).unwrap();
        assert!(!format!("{:?}", pool).contains("secret"));
    }
}
