//! `villadmin-auth` — client-side session core.
//!
//! Reads claims from bearer tokens, persists the credential pair, evaluates
//! the current session and prunes role-gated navigation. This crate is
//! intentionally decoupled from HTTP; the gateway lives in `villadmin-client`.

pub mod claims;
pub mod guard;
pub mod navigation;
pub mod roles;
pub mod session;
pub mod token_store;

pub use claims::{Claims, DecodeError, decode};
pub use guard::Redirect;
pub use navigation::{NavGroup, NavItem, NavigationError, NavigationTree, SiteLink};
pub use roles::RoleLevel;
pub use session::{Navigator, NoopNavigator, ROOT_ROUTE, Session};
pub use token_store::{
    CredentialPair, FileStorage, MemoryStorage, StorageBackend, StorageError, TokenSlot,
    TokenStore,
};
