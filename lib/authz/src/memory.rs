//! In-memory identity store for embedding and testing.
//!
//! One store answers every collaborator trait the engine needs. Role ids are
//! kept in ordered sets so every answer is ascending by construction.

use crate::error::LookupError;
use crate::store::{
    ClientDirectory, GroupRoleAssignments, RolePermissionIndex, UserDirectory,
    UserRoleAssignments,
};
use crate::types::{ClientStatus, RoleFilter, UserGroup, UserStatus};
use async_trait::async_trait;
use rootcause::prelude::Report;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use warden_core::{ClientId, PermissionId, RoleId, UserId};

#[derive(Debug, Default)]
struct State {
    permissions_by_role: HashMap<RoleId, BTreeSet<PermissionId>>,
    user_roles: HashMap<UserId, BTreeSet<RoleId>>,
    group_roles: HashMap<UserGroup, BTreeSet<RoleId>>,
    users: HashMap<UserId, (UserGroup, UserStatus)>,
    clients: HashMap<ClientId, ClientStatus>,
}

/// Thread-safe in-memory identity store.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    state: RwLock<State>,
}

impl InMemoryIdentityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants permissions to a role.
    pub async fn grant(&self, role_id: RoleId, permission_ids: &[PermissionId]) {
        let mut state = self.state.write().await;
        state
            .permissions_by_role
            .entry(role_id)
            .or_default()
            .extend(permission_ids.iter().copied());
    }

    /// Revokes permissions from a role.
    pub async fn revoke(&self, role_id: RoleId, permission_ids: &[PermissionId]) {
        let mut state = self.state.write().await;
        if let Some(granted) = state.permissions_by_role.get_mut(&role_id) {
            for permission_id in permission_ids {
                granted.remove(permission_id);
            }
        }
    }

    /// Assigns a role directly to a user.
    pub async fn assign_to_user(&self, user_id: UserId, role_id: RoleId) {
        let mut state = self.state.write().await;
        state.user_roles.entry(user_id).or_default().insert(role_id);
    }

    /// Removes a role assignment from a user.
    pub async fn unassign_from_user(&self, user_id: UserId, role_id: RoleId) {
        let mut state = self.state.write().await;
        if let Some(roles) = state.user_roles.get_mut(&user_id) {
            roles.remove(&role_id);
        }
    }

    /// Assigns a role to every user in a group.
    pub async fn assign_to_group(&self, group: UserGroup, role_id: RoleId) {
        let mut state = self.state.write().await;
        state.group_roles.entry(group).or_default().insert(role_id);
    }

    /// Removes a role assignment from a group.
    pub async fn unassign_from_group(&self, group: UserGroup, role_id: RoleId) {
        let mut state = self.state.write().await;
        if let Some(roles) = state.group_roles.get_mut(&group) {
            roles.remove(&role_id);
        }
    }

    /// Registers or replaces a user.
    pub async fn put_user(&self, user_id: UserId, group: UserGroup, status: UserStatus) {
        let mut state = self.state.write().await;
        state.users.insert(user_id, (group, status));
    }

    /// Registers or replaces a client.
    pub async fn put_client(&self, client_id: ClientId, status: ClientStatus) {
        let mut state = self.state.write().await;
        state.clients.insert(client_id, status);
    }
}

/// Returns the roles of `role_filter` contained in `assigned`, keeping the filter order.
fn intersect(assigned: Option<&BTreeSet<RoleId>>, role_filter: &RoleFilter) -> Vec<RoleId> {
    match assigned {
        Some(assigned) => role_filter
            .as_slice()
            .iter()
            .copied()
            .filter(|id| assigned.contains(id))
            .collect(),
        None => Vec::new(),
    }
}

#[async_trait]
impl RolePermissionIndex for InMemoryIdentityStore {
    #[instrument(skip(self))]
    async fn role_ids_by_permission(
        &self,
        permission_id: PermissionId,
    ) -> Result<RoleFilter, Report<LookupError>> {
        let state = self.state.read().await;
        let role_ids: BTreeSet<RoleId> = state
            .permissions_by_role
            .iter()
            .filter(|(_, granted)| granted.contains(&permission_id))
            .map(|(role_id, _)| *role_id)
            .collect();

        debug!(count = role_ids.len(), "roles carrying permission");
        Ok(RoleFilter::from_sorted_unchecked(role_ids.into_iter().collect()))
    }

    async fn are_granted(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<bool, Report<LookupError>> {
        let state = self.state.read().await;
        Ok(state
            .permissions_by_role
            .get(&role_id)
            .is_some_and(|granted| permission_ids.iter().all(|p| granted.contains(p))))
    }
}

#[async_trait]
impl UserRoleAssignments for InMemoryIdentityStore {
    async fn user_role_ids(
        &self,
        user_id: UserId,
        role_filter: &RoleFilter,
    ) -> Result<Vec<RoleId>, Report<LookupError>> {
        let state = self.state.read().await;
        Ok(intersect(state.user_roles.get(&user_id), role_filter))
    }
}

#[async_trait]
impl GroupRoleAssignments for InMemoryIdentityStore {
    async fn group_role_ids(
        &self,
        group: UserGroup,
        role_filter: &RoleFilter,
    ) -> Result<Vec<RoleId>, Report<LookupError>> {
        let state = self.state.read().await;
        Ok(intersect(state.group_roles.get(&group), role_filter))
    }
}

#[async_trait]
impl UserDirectory for InMemoryIdentityStore {
    async fn group_and_status(
        &self,
        user_id: UserId,
    ) -> Result<(UserGroup, UserStatus), Report<LookupError>> {
        let state = self.state.read().await;
        match state.users.get(&user_id) {
            Some(entry) => Ok(*entry),
            None => Err(LookupError::UserNotFound { user_id }.into()),
        }
    }
}

#[async_trait]
impl ClientDirectory for InMemoryIdentityStore {
    async fn client_status(&self, client_id: ClientId) -> Result<ClientStatus, Report<LookupError>> {
        let state = self.state.read().await;
        match state.clients.get(&client_id) {
            Some(status) => Ok(*status),
            None => Err(LookupError::ClientNotFound { client_id }.into()),
        }
    }
}
