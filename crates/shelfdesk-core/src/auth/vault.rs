use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use tracing::warn;

use super::credentials::{StoreKey, TokenStore};
use super::session::{CredentialPair, SessionUser};

/// Typed view over a `TokenStore`.
///
/// Clone is cheap and every clone shares the same underlying store. Writes
/// that replace or end a session are serialized on a lock shared by all
/// clones, so a renewal finishing late can check that its session is still
/// the stored one before touching it.
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn TokenStore>,
    writes: Arc<Mutex<()>>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn write_lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| anyhow!("Credential vault lock poisoned"))
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.store.get(StoreKey::AccessToken)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.store.get(StoreKey::RefreshToken)
    }

    /// Both tokens, if both are present.
    pub fn credentials(&self) -> Result<Option<CredentialPair>> {
        let access = self.access_token()?;
        let refresh = self.refresh_token()?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        })
    }

    /// The cached user. An unreadable snapshot is treated as absent.
    pub fn session_user(&self) -> Result<Option<SessionUser>> {
        let Some(raw) = self.store.get(StoreKey::User)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session user snapshot");
                Ok(None)
            }
        }
    }

    /// Replace the whole session with a fresh login.
    pub fn store_session(&self, pair: &CredentialPair, user: &SessionUser) -> Result<()> {
        let user_json =
            serde_json::to_string(user).context("Failed to serialize session user")?;
        let _guard = self.write_lock()?;
        self.store.set(StoreKey::AccessToken, &pair.access_token)?;
        self.store.set(StoreKey::RefreshToken, &pair.refresh_token)?;
        self.store.set(StoreKey::User, &user_json)?;
        Ok(())
    }

    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.store.set(StoreKey::AccessToken, token)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<()> {
        self.store.set(StoreKey::RefreshToken, token)
    }

    /// Store a renewed access token, and a rotated refresh token if the
    /// server issued one, but only while `exchanged` is still the stored
    /// refresh token. Returns false if the session was replaced or ended.
    pub fn commit_renewal(
        &self,
        exchanged: &str,
        access_token: &str,
        rotated_refresh: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.write_lock()?;
        if self.refresh_token()?.as_deref() != Some(exchanged) {
            return Ok(false);
        }
        self.store.set(StoreKey::AccessToken, access_token)?;
        if let Some(rotated) = rotated_refresh {
            self.store.set(StoreKey::RefreshToken, rotated)?;
        }
        Ok(true)
    }

    /// Clear the session if its refresh token is still `expected`.
    pub fn clear_if_refresh_token(&self, expected: Option<&str>) -> Result<bool> {
        let _guard = self.write_lock()?;
        if self.refresh_token()?.as_deref() != expected {
            return Ok(false);
        }
        self.remove_all()?;
        Ok(true)
    }

    /// Clear the session if its access token is still `expected`.
    pub fn clear_if_access_token(&self, expected: Option<&str>) -> Result<bool> {
        let _guard = self.write_lock()?;
        if self.access_token()?.as_deref() != expected {
            return Ok(false);
        }
        self.remove_all()?;
        Ok(true)
    }

    /// Remove tokens and user. Every key is attempted even if one fails.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock()?;
        self.remove_all()
    }

    fn remove_all(&self) -> Result<()> {
        let mut first_error = None;
        for key in StoreKey::ALL {
            if let Err(e) = self.store.remove(key) {
                warn!(key = key.as_str(), error = %e, "Failed to remove credential");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::MemoryStore;
    use crate::auth::session::Role;

    fn user() -> SessionUser {
        SessionUser {
            id: 3,
            username: "reader".to_string(),
            email: None,
            role: Role::Student,
            first_name: None,
            last_name: None,
            phone_number: None,
            date_joined: None,
        }
    }

    #[test]
    fn test_store_session_then_read_back() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A1", "R1"), &user())
            .unwrap();

        assert_eq!(vault.credentials().unwrap(), Some(CredentialPair::new("A1", "R1")));
        assert_eq!(vault.session_user().unwrap(), Some(user()));
    }

    #[test]
    fn test_set_access_token_keeps_refresh_token() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A1", "R1"), &user())
            .unwrap();
        vault.set_access_token("A2").unwrap();
        assert_eq!(vault.credentials().unwrap(), Some(CredentialPair::new("A2", "R1")));
    }

    #[test]
    fn test_clear_removes_everything() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A1", "R1"), &user())
            .unwrap();
        vault.clear().unwrap();

        assert_eq!(vault.access_token().unwrap(), None);
        assert_eq!(vault.refresh_token().unwrap(), None);
        assert_eq!(vault.session_user().unwrap(), None);
        // Clearing an empty store is fine
        vault.clear().unwrap();
    }

    #[test]
    fn test_renewal_commits_while_session_unchanged() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A1", "R1"), &user())
            .unwrap();

        assert!(vault.commit_renewal("R1", "A2", None).unwrap());
        assert_eq!(vault.credentials().unwrap(), Some(CredentialPair::new("A2", "R1")));

        assert!(vault.commit_renewal("R1", "A3", Some("R2")).unwrap());
        assert_eq!(vault.credentials().unwrap(), Some(CredentialPair::new("A3", "R2")));
    }

    #[test]
    fn test_renewal_for_ended_session_is_dropped() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A1", "R1"), &user())
            .unwrap();
        vault.clear().unwrap();

        assert!(!vault.commit_renewal("R1", "A2", None).unwrap());
        assert_eq!(vault.access_token().unwrap(), None);
    }

    #[test]
    fn test_renewal_for_replaced_session_is_dropped() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A5", "R5"), &user())
            .unwrap();

        assert!(!vault.commit_renewal("R1", "A2", Some("R2")).unwrap());
        assert_eq!(vault.credentials().unwrap(), Some(CredentialPair::new("A5", "R5")));
    }

    #[test]
    fn test_conditional_clear_keeps_newer_session() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A5", "R5"), &user())
            .unwrap();

        assert!(!vault.clear_if_refresh_token(Some("R1")).unwrap());
        assert!(!vault.clear_if_access_token(Some("A1")).unwrap());
        assert_eq!(vault.credentials().unwrap(), Some(CredentialPair::new("A5", "R5")));
        assert_eq!(vault.session_user().unwrap(), Some(user()));

        assert!(vault.clear_if_access_token(Some("A5")).unwrap());
        assert_eq!(vault.credentials().unwrap(), None);
        assert_eq!(vault.session_user().unwrap(), None);
    }

    #[test]
    fn test_partial_pair_is_not_credentials() {
        let store = Arc::new(MemoryStore::new());
        store.set(StoreKey::AccessToken, "A1").unwrap();
        let vault = CredentialVault::new(store);
        assert_eq!(vault.credentials().unwrap(), None);
        assert_eq!(vault.access_token().unwrap().as_deref(), Some("A1"));
    }

    #[test]
    fn test_unreadable_user_reads_as_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set(StoreKey::User, "not json").unwrap();
        let vault = CredentialVault::new(store);
        assert_eq!(vault.session_user().unwrap(), None);
    }
}
