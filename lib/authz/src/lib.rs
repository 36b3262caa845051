//! Role-based authorization resolution for warden.
//!
//! Given a principal (an authenticated user or an anonymous caller) and the
//! permissions an operation requires, the [`AuthorizationEngine`] decides
//! whether the principal is authorized and which of its roles justified each
//! permission.
//!
//! A user holds a permission when a role carrying it is assigned to the user
//! directly or to the user's [`UserGroup`]. Anonymous callers hold exactly the
//! permissions granted to the configured anonymous role.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_authz::memory::InMemoryIdentityStore;
//! use warden_authz::{AuthorizationEngine, Collaborators, EngineConfig, UserGroup, UserStatus};
//! use warden_core::{PermissionId, RoleId, UserId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(InMemoryIdentityStore::new());
//! let user = UserId::new(7);
//! let read = PermissionId::new(3);
//!
//! store.put_user(user, UserGroup::Users, UserStatus::Active).await;
//! store.grant(RoleId::new(9), &[read]).await;
//! store.assign_to_group(UserGroup::Users, RoleId::new(9)).await;
//!
//! let engine = AuthorizationEngine::new(EngineConfig::default(), Collaborators::from_store(store));
//! let info = engine
//!     .authorize(Some(user), None, &[read])
//!     .await
//!     .expect("user should be authorized");
//!
//! assert_eq!(info.roles_for(read), Some(&[RoleId::new(9)][..]));
//! # }
//! ```

mod combine;
mod config;
mod engine;
mod error;
pub mod memory;
mod store;
mod types;

pub use config::EngineConfig;
pub use engine::{AuthorizationEngine, Collaborators};
pub use error::{AuthorizationError, ErrorKind, LookupError};
pub use store::{
    ClientDirectory, GroupRoleAssignments, RolePermissionIndex, UserDirectory,
    UserRoleAssignments,
};
pub use types::{
    AuthorizationInfo, ClientStatus, PermissionWithRoles, RoleFilter, UserGroup, UserStatus,
};
