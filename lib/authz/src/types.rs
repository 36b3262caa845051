//! Authorization data model.
//!
//! Every value here is an immutable snapshot built for a single
//! authorization call.

use crate::error::LookupError;
use serde::{Deserialize, Serialize};
use std::fmt;
use warden_core::{PermissionId, RoleId};

/// Coarse classification of a user, used to resolve group-wide role grants.
///
/// Every user belongs to exactly one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserGroup {
    /// Unauthenticated callers.
    AnonymousUsers = 1,
    /// Superusers.
    Superusers = 2,
    /// Internal system accounts.
    SystemUsers = 3,
    /// Administrators.
    Admins = 4,
    /// Standard users.
    Users = 5,
}

impl UserGroup {
    /// Returns the group name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnonymousUsers => "anonymousUsers",
            Self::Superusers => "superusers",
            Self::SystemUsers => "systemUsers",
            Self::Admins => "admins",
            Self::Users => "users",
        }
    }
}

impl fmt::Display for UserGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u64> for UserGroup {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::AnonymousUsers),
            2 => Ok(Self::Superusers),
            3 => Ok(Self::SystemUsers),
            4 => Ok(Self::Admins),
            5 => Ok(Self::Users),
            other => Err(other),
        }
    }
}

macro_rules! define_status {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum $name {
            /// Registered but not yet activated.
            New = 1,
            /// Waiting for approval.
            PendingApproval = 2,
            /// Active.
            Active = 3,
            /// Locked out.
            LockedOut = 4,
            /// Locked out for a limited period.
            TemporarilyLockedOut = 5,
            /// Disabled.
            Disabled = 6,
            /// Deleted.
            Deleted = 7,
        }

        impl $name {
            /// Returns the status name.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    Self::New => "new",
                    Self::PendingApproval => "pendingApproval",
                    Self::Active => "active",
                    Self::LockedOut => "lockedOut",
                    Self::TemporarilyLockedOut => "temporarilyLockedOut",
                    Self::Disabled => "disabled",
                    Self::Deleted => "deleted",
                }
            }

            /// Returns true if the status is `Active`.
            #[must_use]
            pub fn is_active(&self) -> bool {
                matches!(self, Self::Active)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

define_status!(
    /// Lifecycle status of a user account.
    UserStatus
);

define_status!(
    /// Lifecycle status of a registered client.
    ClientStatus
);

/// Ascending, duplicate-free list of the roles that carry one permission.
///
/// The ordering is what lets the engine combine user and group assignments
/// with linear merges instead of set lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleFilter(Vec<RoleId>);

impl RoleFilter {
    /// Creates a role filter from ids that are already strictly ascending.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidRoleFilter`] if the ids are out of order
    /// or repeated.
    pub fn new(ids: Vec<RoleId>) -> Result<Self, LookupError> {
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(LookupError::InvalidRoleFilter {
                reason: format!("{} is followed by {}", pair[0], pair[1]),
            });
        }
        Ok(Self(ids))
    }

    /// Creates a role filter from ids in any order, dropping duplicates.
    #[must_use]
    pub fn from_unsorted(mut ids: Vec<RoleId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    /// Wraps ids the caller has already proven ascending and unique.
    pub(crate) fn from_sorted_unchecked(ids: Vec<RoleId>) -> Self {
        debug_assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        Self(ids)
    }

    /// Returns the role ids.
    #[must_use]
    pub fn as_slice(&self) -> &[RoleId] {
        &self.0
    }

    /// Returns the number of roles in the filter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no role carries the permission.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the role is part of the filter.
    #[must_use]
    pub fn contains(&self, role_id: RoleId) -> bool {
        self.0.binary_search(&role_id).is_ok()
    }

    /// Consumes the filter, returning the role ids.
    #[must_use]
    pub fn into_vec(self) -> Vec<RoleId> {
        self.0
    }
}

impl<'de> Deserialize<'de> for RoleFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ids = Vec::<RoleId>::deserialize(deserializer)?;
        Self::new(ids).map_err(serde::de::Error::custom)
    }
}

/// A required permission together with the roles that justified it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionWithRoles {
    /// The required permission.
    pub permission_id: PermissionId,
    /// Roles held by the principal that carry the permission, ascending.
    pub role_ids: Vec<RoleId>,
}

impl PermissionWithRoles {
    /// Creates a permission/roles pair.
    #[must_use]
    pub fn new(permission_id: PermissionId, role_ids: Vec<RoleId>) -> Self {
        Self {
            permission_id,
            role_ids,
        }
    }
}

/// Result of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationInfo {
    group: UserGroup,
    permission_roles: Vec<PermissionWithRoles>,
}

impl AuthorizationInfo {
    /// Creates authorization info.
    #[must_use]
    pub fn new(group: UserGroup, permission_roles: Vec<PermissionWithRoles>) -> Self {
        Self {
            group,
            permission_roles,
        }
    }

    /// Returns the group the principal was resolved to.
    #[must_use]
    pub fn group(&self) -> UserGroup {
        self.group
    }

    /// Returns the role trail, one entry per required permission, in request order.
    #[must_use]
    pub fn permission_roles(&self) -> &[PermissionWithRoles] {
        &self.permission_roles
    }

    /// Returns the roles that justified a permission, if it was required.
    #[must_use]
    pub fn roles_for(&self, permission_id: PermissionId) -> Option<&[RoleId]> {
        self.permission_roles
            .iter()
            .find(|pr| pr.permission_id == permission_id)
            .map(|pr| pr.role_ids.as_slice())
    }

    /// Returns the authorized permission ids, in request order.
    pub fn permission_ids(&self) -> impl Iterator<Item = PermissionId> + '_ {
        self.permission_roles.iter().map(|pr| pr.permission_id)
    }
}
