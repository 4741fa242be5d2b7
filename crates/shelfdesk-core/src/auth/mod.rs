//! Authentication state for the gateway.
//!
//! This module provides:
//! - `TokenStore`: Key-value credential storage (memory, JSON file, OS keyring)
//! - `CredentialVault`: Typed access to the stored token pair and user snapshot
//! - `AccessGuard`: Role checks against the stored session
//!
//! Only one session is stored at a time.

pub mod credentials;
pub mod guard;
pub mod session;
pub mod vault;

pub use credentials::{FileStore, KeyringStore, MemoryStore, StoreKey, TokenStore};
pub use guard::{Access, AccessGuard};
pub use session::{CredentialPair, Role, SessionUser};
pub use vault::CredentialVault;
