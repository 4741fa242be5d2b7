use anyhow::Result;

use super::session::{Role, SessionUser};
use super::vault::CredentialVault;

/// Outcome of an access check against the stored session.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Granted(SessionUser),
    /// No access token or no readable user snapshot.
    Unauthenticated,
    /// Logged in, but as a different role than required.
    WrongRole { actual: Role },
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

pub struct AccessGuard;

impl AccessGuard {
    /// Check the stored session, optionally requiring a role.
    ///
    /// This only reads local state; token validity is left to the server.
    pub fn check(vault: &CredentialVault, required: Option<Role>) -> Result<Access> {
        if vault.access_token()?.is_none() {
            return Ok(Access::Unauthenticated);
        }
        let Some(user) = vault.session_user()? else {
            return Ok(Access::Unauthenticated);
        };

        match required {
            Some(role) if user.role != role => Ok(Access::WrongRole { actual: user.role }),
            _ => Ok(Access::Granted(user)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::credentials::{MemoryStore, StoreKey, TokenStore};
    use crate::auth::session::CredentialPair;

    fn librarian() -> SessionUser {
        SessionUser {
            id: 11,
            username: "marian".to_string(),
            email: Some("marian@example.com".to_string()),
            role: Role::Librarian,
            first_name: Some("Marian".to_string()),
            last_name: Some("Paroo".to_string()),
            phone_number: None,
            date_joined: None,
        }
    }

    fn logged_in_vault() -> CredentialVault {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        vault
            .store_session(&CredentialPair::new("A1", "R1"), &librarian())
            .unwrap();
        vault
    }

    #[test]
    fn test_empty_store_is_unauthenticated() {
        let vault = CredentialVault::new(Arc::new(MemoryStore::new()));
        assert_eq!(AccessGuard::check(&vault, None).unwrap(), Access::Unauthenticated);
    }

    #[test]
    fn test_token_without_user_is_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        store.set(StoreKey::AccessToken, "A1").unwrap();
        let vault = CredentialVault::new(store);
        assert_eq!(AccessGuard::check(&vault, None).unwrap(), Access::Unauthenticated);
    }

    #[test]
    fn test_any_role_is_granted_without_requirement() {
        let vault = logged_in_vault();
        let access = AccessGuard::check(&vault, None).unwrap();
        assert!(access.is_granted());
    }

    #[test]
    fn test_matching_role_is_granted() {
        let vault = logged_in_vault();
        assert_eq!(
            AccessGuard::check(&vault, Some(Role::Librarian)).unwrap(),
            Access::Granted(librarian())
        );
    }

    #[test]
    fn test_wrong_role_reports_actual_role() {
        let vault = logged_in_vault();
        assert_eq!(
            AccessGuard::check(&vault, Some(Role::Student)).unwrap(),
            Access::WrongRole { actual: Role::Librarian }
        );
    }
}
