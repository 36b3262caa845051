//! Collaborators the authorization engine resolves against.
//!
//! All implementations must be safe for concurrent calls with independent
//! arguments; the engine fans out over them without locking.
//!
//! Role id lists returned by these traits are ascending and duplicate-free.
//! Assignment lookups must return a subset of the filter they were given.
//! The engine checks the sizes of what comes back and fails with an internal
//! error when a collaborator breaks that contract.

use crate::error::LookupError;
use crate::types::{ClientStatus, RoleFilter, UserGroup, UserStatus};
use async_trait::async_trait;
use rootcause::prelude::Report;
use warden_core::{ClientId, PermissionId, RoleId, UserId};

/// Maps permissions to the roles that carry them.
#[async_trait]
pub trait RolePermissionIndex: Send + Sync {
    /// Returns every role the permission is granted to.
    ///
    /// An empty filter means no role carries the permission.
    async fn role_ids_by_permission(
        &self,
        permission_id: PermissionId,
    ) -> Result<RoleFilter, Report<LookupError>>;

    /// Returns true if every permission is granted to the role.
    async fn are_granted(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<bool, Report<LookupError>>;
}

/// Resolves roles assigned directly to users.
#[async_trait]
pub trait UserRoleAssignments: Send + Sync {
    /// Returns the roles from `role_filter` that are assigned to the user.
    async fn user_role_ids(
        &self,
        user_id: UserId,
        role_filter: &RoleFilter,
    ) -> Result<Vec<RoleId>, Report<LookupError>>;
}

/// Resolves roles assigned to whole user groups.
#[async_trait]
pub trait GroupRoleAssignments: Send + Sync {
    /// Returns the roles from `role_filter` that are assigned to the group.
    async fn group_role_ids(
        &self,
        group: UserGroup,
        role_filter: &RoleFilter,
    ) -> Result<Vec<RoleId>, Report<LookupError>>;
}

/// User lookups.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the group and status of a user.
    async fn group_and_status(
        &self,
        user_id: UserId,
    ) -> Result<(UserGroup, UserStatus), Report<LookupError>>;
}

/// Client lookups.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Returns the status of a client.
    async fn client_status(&self, client_id: ClientId) -> Result<ClientStatus, Report<LookupError>>;
}
