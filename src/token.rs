//! Bearer token and user summary storage
//!
//! Reads come from an in-memory cache; every write replaces the cached value
//! atomically and, for durable stores, replaces the file on disk by renaming
//! a fully written temporary file over it.

use crate::Result;
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TOKEN_FILE: &str = "token";
const USER_FILE: &str = "user.json";

/// Last known details of the signed-in user, kept for display only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role, e.g. `admin`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Account status, e.g. `pending` or `approved`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Team number the user belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_number: Option<String>,
    /// Id of the team record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

/// Storage for the bearer token and the user summary.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone, Debug)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    token: ArcSwapOption<String>,
    user: ArcSwapOption<UserSummary>,
    dir: Option<PathBuf>,
}

impl TokenStore {
    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: ArcSwapOption::empty(),
                user: ArcSwapOption::empty(),
                dir: None,
            }),
        }
    }

    /// Open a durable store in `dir`, loading any saved state.
    ///
    /// The directory is created if missing. A corrupt user summary is
    /// discarded rather than failing the open.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let token = read_optional(&dir.join(TOKEN_FILE))?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let user = match read_optional(&dir.join(USER_FILE))? {
            Some(raw) => match serde_json::from_str::<UserSummary>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Discarding unreadable user summary: {}", e);
                    remove_optional(&dir.join(USER_FILE))?;
                    None
                }
            },
            None => None,
        };

        tracing::debug!(path = %dir.display(), has_token = token.is_some(), "Opened token store");

        Ok(Self {
            inner: Arc::new(Inner {
                token: ArcSwapOption::new(token.map(Arc::new)),
                user: ArcSwapOption::new(user.map(Arc::new)),
                dir: Some(dir),
            }),
        })
    }

    /// Current token, if any
    pub fn get_token(&self) -> Option<String> {
        self.inner.token.load_full().map(|t| (*t).clone())
    }

    /// Whether a token is stored
    pub fn has_token(&self) -> bool {
        self.inner.token.load().is_some()
    }

    /// Replace the stored token
    pub fn set_token(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        if let Some(dir) = &self.inner.dir {
            write_atomic(dir, TOKEN_FILE, token.as_bytes())?;
        }
        self.inner.token.store(Some(Arc::new(token)));
        Ok(())
    }

    /// Remove the stored token
    pub fn clear_token(&self) -> Result<()> {
        self.take_token().map(|_| ())
    }

    /// Remove the stored token and return the value it had.
    ///
    /// The cache is emptied before the file is touched, so the token is gone
    /// for readers even when removing the file fails.
    pub fn take_token(&self) -> Result<Option<String>> {
        let previous = self.inner.token.swap(None);
        if let Some(dir) = &self.inner.dir {
            remove_optional(&dir.join(TOKEN_FILE))?;
        }
        Ok(previous.map(|t| (*t).clone()))
    }

    /// Remove the stored token only if it is still `expected`.
    ///
    /// Returns whether the token was removed. A token replaced in the
    /// meantime, e.g. by a new sign-in, is left alone.
    pub fn take_token_if(&self, expected: &str) -> Result<bool> {
        let current = self.inner.token.load();
        if current.as_deref().map(String::as_str) != Some(expected) {
            return Ok(false);
        }
        let previous = self.inner.token.compare_and_swap(&current, None::<Arc<String>>);
        let swapped = match (&*previous, &*current) {
            (Some(previous), Some(current)) => Arc::ptr_eq(previous, current),
            _ => false,
        };
        if swapped {
            if let Some(dir) = &self.inner.dir {
                remove_optional(&dir.join(TOKEN_FILE))?;
            }
        }
        Ok(swapped)
    }

    /// Last known user summary
    pub fn user(&self) -> Option<UserSummary> {
        self.inner.user.load_full().map(|u| (*u).clone())
    }

    /// Replace the user summary
    pub fn set_user(&self, user: &UserSummary) -> Result<()> {
        if let Some(dir) = &self.inner.dir {
            let json = serde_json::to_vec(user)?;
            write_atomic(dir, USER_FILE, &json)?;
        }
        self.inner.user.store(Some(Arc::new(user.clone())));
        Ok(())
    }

    /// Remove the user summary
    pub fn clear_user(&self) -> Result<()> {
        self.inner.user.store(None);
        if let Some(dir) = &self.inner.dir {
            remove_optional(&dir.join(USER_FILE))?;
        }
        Ok(())
    }

    /// Remove both token and user summary
    pub fn clear(&self) -> Result<()> {
        let token = self.clear_token();
        let user = self.clear_user();
        token.and(user)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_optional(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<()> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(dir.join(name)).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_is_visible_immediately() {
        let store = TokenStore::in_memory();
        assert_eq!(store.get_token(), None);

        store.set_token("first").unwrap();
        store.set_token("second").unwrap();
        assert_eq!(store.get_token().as_deref(), Some("second"));

        store.clear_token().unwrap();
        assert_eq!(store.get_token(), None);
        assert!(!store.has_token());
    }

    #[test]
    fn take_returns_previous_value_once() {
        let store = TokenStore::in_memory();
        store.set_token("abc").unwrap();
        assert_eq!(store.take_token().unwrap().as_deref(), Some("abc"));
        assert_eq!(store.take_token().unwrap(), None);
    }

    #[test]
    fn conditional_take_leaves_newer_token() {
        let store = TokenStore::in_memory();
        store.set_token("old").unwrap();
        store.set_token("new").unwrap();

        assert!(!store.take_token_if("old").unwrap());
        assert_eq!(store.get_token().as_deref(), Some("new"));

        assert!(store.take_token_if("new").unwrap());
        assert_eq!(store.get_token(), None);
        assert!(!store.take_token_if("new").unwrap());
    }

    #[test]
    fn conditional_take_removes_durable_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path()).unwrap();
        store.set_token("abc").unwrap();

        assert!(store.take_token_if("abc").unwrap());
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn clones_share_state() {
        let store = TokenStore::in_memory();
        let other = store.clone();
        store.set_token("shared").unwrap();
        assert_eq!(other.get_token().as_deref(), Some("shared"));
    }

    #[test]
    fn durable_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserSummary {
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            role: Some("admin".to_string()),
            ..Default::default()
        };

        let store = TokenStore::open(dir.path()).unwrap();
        store.set_token("persisted").unwrap();
        store.set_user(&user).unwrap();

        let reopened = TokenStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_token().as_deref(), Some("persisted"));
        assert_eq!(reopened.user(), Some(user));

        reopened.clear().unwrap();
        let reopened = TokenStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_token(), None);
        assert_eq!(reopened.user(), None);
    }

    #[test]
    fn corrupt_user_summary_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(USER_FILE), "{not json").unwrap();

        let store = TokenStore::open(dir.path()).unwrap();
        assert_eq!(store.user(), None);
        assert!(!dir.path().join(USER_FILE).exists());
    }

    #[test]
    fn user_summary_uses_camel_case() {
        let user: UserSummary =
            serde_json::from_str(r#"{"name":"Bo","teamNumber":"254","teamId":"t-9","extra":1}"#)
                .unwrap();
        assert_eq!(user.team_number.as_deref(), Some("254"));
        assert_eq!(user.team_id.as_deref(), Some("t-9"));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["teamId"], "t-9");
        assert_eq!(user.id, None);
    }
}
