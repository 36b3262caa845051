//! Grants snapshot loading.
//!
//! A snapshot is a JSON document describing users, clients, role grants and
//! group role assignments. It is loaded into an in-memory identity store that
//! the engine then resolves against.

use crate::error::SetupError;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;
use warden_authz::memory::InMemoryIdentityStore;
use warden_authz::{ClientStatus, UserGroup, UserStatus};
use warden_core::{ClientId, PermissionId, RoleId, UserId};

/// A user and the roles assigned to them directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserEntry {
    pub id: UserId,
    pub group: UserGroup,
    pub status: UserStatus,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientEntry {
    pub id: ClientId,
    pub status: ClientStatus,
}

/// A role and the permissions granted to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleEntry {
    pub id: RoleId,
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
}

/// Roles assigned to every member of a group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupRolesEntry {
    pub group: UserGroup,
    pub roles: Vec<RoleId>,
}

/// Grants snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub clients: Vec<ClientEntry>,
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
    #[serde(default)]
    pub group_roles: Vec<GroupRolesEntry>,
}

impl Snapshot {
    /// Reads and parses a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self, Report<SetupError>> {
        let json = std::fs::read_to_string(path).map_err(|e| SetupError::ReadSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let snapshot: Self = serde_json::from_str(&json).map_err(|e| SetupError::ParseSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(
            users = snapshot.users.len(),
            clients = snapshot.clients.len(),
            roles = snapshot.roles.len(),
            "loaded grants snapshot"
        );
        Ok(snapshot)
    }

    /// Builds an in-memory identity store holding the snapshot.
    pub async fn into_store(self) -> InMemoryIdentityStore {
        let store = InMemoryIdentityStore::new();

        for role in self.roles {
            store.grant(role.id, &role.permissions).await;
        }
        for user in self.users {
            store.put_user(user.id, user.group, user.status).await;
            for role_id in user.roles {
                store.assign_to_user(user.id, role_id).await;
            }
        }
        for client in self.clients {
            store.put_client(client.id, client.status).await;
        }
        for entry in self.group_roles {
            for role_id in entry.roles {
                store.assign_to_group(entry.group, role_id).await;
            }
        }

        store
    }
}
