//! Authorization resolution engine.
//!
//! Decides whether a principal holds every required permission and records
//! which roles justified each one. The engine is stateless: one instance can
//! serve any number of concurrent calls.

use crate::combine::{merge_group_roles, unmatched_roles};
use crate::config::EngineConfig;
use crate::error::AuthorizationError;
use crate::store::{
    ClientDirectory, GroupRoleAssignments, RolePermissionIndex, UserDirectory,
    UserRoleAssignments,
};
use crate::types::{AuthorizationInfo, PermissionWithRoles, RoleFilter, UserGroup};
use futures::future::join_all;
use rootcause::prelude::{Report, ResultExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use warden_core::{ClientId, OperationId, PermissionId, RoleId, UserId};

/// The lookups the engine resolves against.
#[derive(Clone)]
pub struct Collaborators {
    /// Permission to role index.
    pub role_permissions: Arc<dyn RolePermissionIndex>,
    /// Direct user role assignments.
    pub user_roles: Arc<dyn UserRoleAssignments>,
    /// Group role assignments.
    pub group_roles: Arc<dyn GroupRoleAssignments>,
    /// User group and status lookups.
    pub users: Arc<dyn UserDirectory>,
    /// Client status lookups.
    pub clients: Arc<dyn ClientDirectory>,
}

impl Collaborators {
    /// Uses one store for every lookup.
    #[must_use]
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RolePermissionIndex
            + UserRoleAssignments
            + GroupRoleAssignments
            + UserDirectory
            + ClientDirectory
            + 'static,
    {
        Self {
            role_permissions: store.clone(),
            user_roles: store.clone(),
            group_roles: store.clone(),
            users: store.clone(),
            clients: store,
        }
    }
}

/// Resolves authorization for users and anonymous callers.
#[derive(Clone)]
pub struct AuthorizationEngine {
    config: EngineConfig,
    lookups: Collaborators,
}

impl AuthorizationEngine {
    /// Creates an engine over the given lookups.
    #[must_use]
    pub fn new(config: EngineConfig, lookups: Collaborators) -> Self {
        Self { config, lookups }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Authorizes a principal for every permission in `required_permission_ids`.
    ///
    /// A present `user_id` selects the authenticated-user path; otherwise the
    /// caller is treated as anonymous. A present `client_id` must belong to an
    /// active client on either path.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthorizationError::InvalidInput`] for an empty permission
    /// list, an invalid-status error for an inactive user or client,
    /// [`AuthorizationError::PermissionNotGranted`] when any permission is not
    /// held, and an internal error when a lookup fails or breaks its contract.
    #[instrument(
        skip_all,
        fields(
            operation_id = %OperationId::new(),
            user_id = ?user_id,
            client_id = ?client_id,
            permissions = required_permission_ids.len(),
        )
    )]
    pub async fn authorize(
        &self,
        user_id: Option<UserId>,
        client_id: Option<ClientId>,
        required_permission_ids: &[PermissionId],
    ) -> Result<AuthorizationInfo, Report<AuthorizationError>> {
        if required_permission_ids.is_empty() {
            return Err(AuthorizationError::InvalidInput {
                reason: "number of required permission ids is 0".to_string(),
            }
            .into());
        }

        if let Some(client_id) = client_id {
            self.ensure_client_is_active(client_id).await?;
        }

        let info = match user_id {
            Some(user_id) => self.authorize_user(user_id, required_permission_ids).await?,
            None => self.authorize_anonymous(required_permission_ids).await?,
        };

        info!(
            user_group = %info.group(),
            permission_roles = ?info.permission_roles(),
            "principal has been authorized"
        );
        Ok(info)
    }

    async fn ensure_client_is_active(
        &self,
        client_id: ClientId,
    ) -> Result<(), Report<AuthorizationError>> {
        let status = self
            .lookups
            .clients
            .client_status(client_id)
            .await
            .context(AuthorizationError::Collaborator {
                operation: "get a client status by id",
            })?;

        if !status.is_active() {
            warn!(%client_id, %status, "client is not active");
            return Err(AuthorizationError::InvalidClientStatus { client_id, status }.into());
        }
        Ok(())
    }

    async fn authorize_user(
        &self,
        user_id: UserId,
        required_permission_ids: &[PermissionId],
    ) -> Result<AuthorizationInfo, Report<AuthorizationError>> {
        let (group, status) = self
            .lookups
            .users
            .group_and_status(user_id)
            .await
            .context(AuthorizationError::Collaborator {
                operation: "get a group and a status of the user by id",
            })?;

        if !status.is_active() {
            warn!(%user_id, %status, "user is not active");
            return Err(AuthorizationError::InvalidUserStatus { user_id, status }.into());
        }

        let role_ids = match required_permission_ids {
            [permission_id] => vec![self.resolve_permission(user_id, group, *permission_id).await?],
            _ => {
                self.resolve_permissions(user_id, group, required_permission_ids)
                    .await?
            }
        };

        let permission_roles = required_permission_ids
            .iter()
            .copied()
            .zip(role_ids)
            .map(|(permission_id, role_ids)| PermissionWithRoles::new(permission_id, role_ids))
            .collect();

        Ok(AuthorizationInfo::new(group, permission_roles))
    }

    /// Resolves a single permission sequentially.
    async fn resolve_permission(
        &self,
        user_id: UserId,
        group: UserGroup,
        permission_id: PermissionId,
    ) -> Result<Vec<RoleId>, Report<AuthorizationError>> {
        let role_filter = self
            .lookups
            .role_permissions
            .role_ids_by_permission(permission_id)
            .await
            .context(AuthorizationError::Collaborator {
                operation: "get all role ids by permission id",
            })?;

        if role_filter.is_empty() {
            debug!(%permission_id, "no roles carry the permission");
            return Err(AuthorizationError::PermissionNotGranted.into());
        }

        let role_ids = self
            .combined_user_and_group_roles(user_id, group, &role_filter)
            .await?;

        if role_ids.is_empty() {
            debug!(%permission_id, "none of the roles are assigned to the user or group");
            return Err(AuthorizationError::PermissionNotGranted.into());
        }
        Ok(role_ids)
    }

    /// Resolves several permissions with two concurrent fan-out stages.
    ///
    /// Each stage waits for every task before deciding, so a failure in one
    /// task never cancels the others.
    // TODO: cancel outstanding lookups once one task has failed or come back empty.
    async fn resolve_permissions(
        &self,
        user_id: UserId,
        group: UserGroup,
        required_permission_ids: &[PermissionId],
    ) -> Result<Vec<Vec<RoleId>>, Report<AuthorizationError>> {
        let lookups = required_permission_ids.iter().map(|&permission_id| async move {
            let result = self
                .lookups
                .role_permissions
                .role_ids_by_permission(permission_id)
                .await;
            if let Err(report) = &result {
                error!(%permission_id, error = %report, "failed to get all role ids by permission id");
            }
            result.context(AuthorizationError::Collaborator {
                operation: "get all role ids by permission id",
            })
        });
        let role_filters = gather(
            join_all(lookups).await,
            RoleFilter::is_empty,
            "get all role ids by permission id",
        )?;

        let combinations = role_filters.iter().map(|role_filter| async move {
            let result = self
                .combined_user_and_group_roles(user_id, group, role_filter)
                .await;
            if let Err(report) = &result {
                error!(
                    %user_id,
                    %group,
                    role_filter = ?role_filter.as_slice(),
                    error = %report,
                    "failed to get combined user and group roles"
                );
            }
            result
        });
        gather(
            join_all(combinations).await,
            Vec::is_empty,
            "get combined user and group roles",
        )
    }

    async fn authorize_anonymous(
        &self,
        required_permission_ids: &[PermissionId],
    ) -> Result<AuthorizationInfo, Report<AuthorizationError>> {
        let anonymous_role_id = self.config.anonymous_role_id;
        let granted = self
            .lookups
            .role_permissions
            .are_granted(anonymous_role_id, required_permission_ids)
            .await
            .context(AuthorizationError::Collaborator {
                operation: "are all required permissions granted to the role",
            })?;

        if !granted {
            debug!(%anonymous_role_id, "permissions are not granted to anonymous users");
            return Err(AuthorizationError::PermissionNotGranted.into());
        }

        let permission_roles = required_permission_ids
            .iter()
            .map(|&permission_id| PermissionWithRoles::new(permission_id, vec![anonymous_role_id]))
            .collect();

        Ok(AuthorizationInfo::new(
            UserGroup::AnonymousUsers,
            permission_roles,
        ))
    }

    /// Returns the roles of `role_filter` held by the user directly or
    /// through the group.
    ///
    /// The group is only queried for the roles the user does not hold.
    async fn combined_user_and_group_roles(
        &self,
        user_id: UserId,
        group: UserGroup,
        role_filter: &RoleFilter,
    ) -> Result<Vec<RoleId>, Report<AuthorizationError>> {
        let user_roles = self
            .lookups
            .user_roles
            .user_role_ids(user_id, role_filter)
            .await
            .context(AuthorizationError::Collaborator {
                operation: "get user's role ids by user id",
            })?;

        if user_roles.len() == role_filter.len() {
            if user_roles != role_filter.as_slice() {
                return Err(AuthorizationError::internal("invalid user's roles").into());
            }
            return Ok(user_roles);
        }

        let remainder = RoleFilter::from_sorted_unchecked(unmatched_roles(
            role_filter.as_slice(),
            &user_roles,
        )?);

        let group_roles = self
            .lookups
            .group_roles
            .group_role_ids(group, &remainder)
            .await
            .context(AuthorizationError::Collaborator {
                operation: "get role ids of the group by group",
            })?;

        if group_roles.is_empty() {
            return Ok(user_roles);
        }
        merge_group_roles(&user_roles, remainder.as_slice(), &group_roles)
    }
}

/// Evaluates a fan-out stage once every task has finished.
///
/// Failed tasks fail the stage with a generic error naming `operation` (each
/// task logged its own cause). The stage error is fatal only if some task hit
/// a fatal error. Otherwise any empty result denies the call.
fn gather<T>(
    results: Vec<Result<T, Report<AuthorizationError>>>,
    is_empty: impl Fn(&T) -> bool,
    operation: &'static str,
) -> Result<Vec<T>, Report<AuthorizationError>> {
    let mut values = Vec::with_capacity(results.len());
    let mut has_error = false;
    let mut has_fatal = false;
    let mut all_granted = true;

    for result in results {
        match result {
            Ok(value) => {
                all_granted &= !is_empty(&value);
                values.push(value);
            }
            Err(report) => {
                has_error = true;
                has_fatal |= report.current_context().is_fatal();
            }
        }
    }

    if has_fatal {
        return Err(AuthorizationError::internal(format!(
            "an error occurred while trying to {operation}"
        ))
        .into());
    }
    if has_error {
        return Err(AuthorizationError::Collaborator { operation }.into());
    }
    if !all_granted {
        return Err(AuthorizationError::PermissionNotGranted.into());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, LookupError};
    use crate::memory::InMemoryIdentityStore;
    use crate::types::{ClientStatus, UserStatus};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn roles(ids: &[u64]) -> Vec<RoleId> {
        ids.iter().copied().map(RoleId::new).collect()
    }

    fn permissions(ids: &[u64]) -> Vec<PermissionId> {
        ids.iter().copied().map(PermissionId::new).collect()
    }

    type Responder = Box<dyn Fn(&RoleFilter) -> Result<Vec<RoleId>, Report<LookupError>> + Send + Sync>;

    /// Assignment lookup that answers from a closure and counts its calls.
    struct Scripted {
        respond: Responder,
        calls: AtomicUsize,
        filters: std::sync::Mutex<Vec<Vec<RoleId>>>,
    }

    impl Scripted {
        fn new(
            respond: impl Fn(&RoleFilter) -> Result<Vec<RoleId>, Report<LookupError>>
            + Send
            + Sync
            + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                respond: Box::new(respond),
                calls: AtomicUsize::new(0),
                filters: std::sync::Mutex::new(Vec::new()),
            })
        }

        /// Answers with the given roles, whatever the filter.
        fn returning(ids: &[u64]) -> Arc<Self> {
            let ids = roles(ids);
            Self::new(move |_| Ok(ids.clone()))
        }

        /// Answers with the roles of the filter that are in `held`.
        fn holding(held: &[u64]) -> Arc<Self> {
            let held = roles(held);
            Self::new(move |filter| {
                Ok(filter
                    .as_slice()
                    .iter()
                    .copied()
                    .filter(|id| held.contains(id))
                    .collect())
            })
        }

        fn answer(&self, role_filter: &RoleFilter) -> Result<Vec<RoleId>, Report<LookupError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.filters
                .lock()
                .expect("lock")
                .push(role_filter.as_slice().to_vec());
            (self.respond)(role_filter)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn filters(&self) -> Vec<Vec<RoleId>> {
            self.filters.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl UserRoleAssignments for Scripted {
        async fn user_role_ids(
            &self,
            _user_id: UserId,
            role_filter: &RoleFilter,
        ) -> Result<Vec<RoleId>, Report<LookupError>> {
            self.answer(role_filter)
        }
    }

    #[async_trait]
    impl GroupRoleAssignments for Scripted {
        async fn group_role_ids(
            &self,
            _group: UserGroup,
            role_filter: &RoleFilter,
        ) -> Result<Vec<RoleId>, Report<LookupError>> {
            self.answer(role_filter)
        }
    }

    /// Role index with fixed filters; permissions without an entry fail.
    struct FixedIndex {
        filters: HashMap<PermissionId, Vec<RoleId>>,
        anonymous_grants: Vec<PermissionId>,
    }

    impl FixedIndex {
        fn new(entries: &[(u64, &[u64])]) -> Arc<Self> {
            Arc::new(Self {
                filters: entries
                    .iter()
                    .map(|(p, r)| (PermissionId::new(*p), roles(r)))
                    .collect(),
                anonymous_grants: Vec::new(),
            })
        }
    }

    #[async_trait]
    impl RolePermissionIndex for FixedIndex {
        async fn role_ids_by_permission(
            &self,
            permission_id: PermissionId,
        ) -> Result<RoleFilter, Report<LookupError>> {
            match self.filters.get(&permission_id) {
                Some(ids) => Ok(RoleFilter::new(ids.clone())?),
                None => Err(LookupError::Unavailable {
                    reason: format!("no answer for {permission_id}"),
                }
                .into()),
            }
        }

        async fn are_granted(
            &self,
            _role_id: RoleId,
            permission_ids: &[PermissionId],
        ) -> Result<bool, Report<LookupError>> {
            Ok(permission_ids
                .iter()
                .all(|p| self.anonymous_grants.contains(p)))
        }
    }

    /// Directory with one user and one client.
    struct Principals {
        user: (UserGroup, UserStatus),
        client: ClientStatus,
    }

    #[async_trait]
    impl UserDirectory for Principals {
        async fn group_and_status(
            &self,
            _user_id: UserId,
        ) -> Result<(UserGroup, UserStatus), Report<LookupError>> {
            Ok(self.user)
        }
    }

    #[async_trait]
    impl ClientDirectory for Principals {
        async fn client_status(
            &self,
            _client_id: ClientId,
        ) -> Result<ClientStatus, Report<LookupError>> {
            Ok(self.client)
        }
    }

    fn active_standard_user() -> Arc<Principals> {
        Arc::new(Principals {
            user: (UserGroup::Users, UserStatus::Active),
            client: ClientStatus::Active,
        })
    }

    fn scripted_engine(
        index: Arc<FixedIndex>,
        user_roles: Arc<Scripted>,
        group_roles: Arc<Scripted>,
    ) -> AuthorizationEngine {
        let principals = active_standard_user();
        AuthorizationEngine::new(
            EngineConfig::default(),
            Collaborators {
                role_permissions: index,
                user_roles,
                group_roles,
                users: principals.clone(),
                clients: principals,
            },
        )
    }

    fn kind_of<T: std::fmt::Debug>(result: Result<T, Report<AuthorizationError>>) -> ErrorKind {
        result.expect_err("should fail").current_context().kind()
    }

    const USER: UserId = UserId::new(1);
    const P: PermissionId = PermissionId::new(100);

    #[tokio::test]
    async fn user_and_group_roles_are_combined() {
        let user_roles = Scripted::returning(&[9]);
        let group_roles = Scripted::holding(&[12]);
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9, 12])]),
            user_roles,
            group_roles.clone(),
        );

        let info = engine.authorize(Some(USER), None, &[P]).await.expect("authorized");

        assert_eq!(info.group(), UserGroup::Users);
        assert_eq!(
            info.permission_roles(),
            &[PermissionWithRoles::new(P, roles(&[9, 12]))]
        );
        assert_eq!(group_roles.filters(), vec![roles(&[5, 12])]);
    }

    #[tokio::test]
    async fn group_is_not_queried_when_user_holds_every_role() {
        let group_roles = Scripted::returning(&[]);
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9])]),
            Scripted::holding(&[5, 9]),
            group_roles.clone(),
        );

        let info = engine.authorize(Some(USER), None, &[P]).await.expect("authorized");

        assert_eq!(info.roles_for(P), Some(roles(&[5, 9]).as_slice()));
        assert_eq!(group_roles.calls(), 0);
    }

    #[tokio::test]
    async fn group_only_roles_are_attributed() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[3, 4])]),
            Scripted::returning(&[]),
            Scripted::holding(&[4]),
        );

        let info = engine.authorize(Some(USER), None, &[P]).await.expect("authorized");
        assert_eq!(info.roles_for(P), Some(roles(&[4]).as_slice()));
    }

    #[tokio::test]
    async fn user_roles_alone_suffice_when_group_has_none() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[3, 4, 8])]),
            Scripted::holding(&[4]),
            Scripted::returning(&[]),
        );

        let info = engine.authorize(Some(USER), None, &[P]).await.expect("authorized");
        assert_eq!(info.roles_for(P), Some(roles(&[4]).as_slice()));
    }

    #[tokio::test]
    async fn no_held_role_is_denied() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[3, 4])]),
            Scripted::returning(&[]),
            Scripted::returning(&[]),
        );

        let result = engine.authorize(Some(USER), None, &[P]).await;
        assert_eq!(kind_of(result), ErrorKind::PermissionNotGranted);
    }

    #[tokio::test]
    async fn empty_role_filter_is_denied_without_assignment_lookups() {
        let user_roles = Scripted::returning(&[]);
        let group_roles = Scripted::returning(&[]);
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[])]),
            user_roles.clone(),
            group_roles.clone(),
        );

        let result = engine.authorize(Some(USER), None, &[P]).await;

        assert_eq!(kind_of(result), ErrorKind::PermissionNotGranted);
        assert_eq!(user_roles.calls(), 0);
        assert_eq!(group_roles.calls(), 0);
    }

    #[tokio::test]
    async fn empty_permission_list_is_invalid_input() {
        let engine = scripted_engine(
            FixedIndex::new(&[]),
            Scripted::returning(&[]),
            Scripted::returning(&[]),
        );

        let result = engine.authorize(Some(USER), None, &[]).await;
        assert_eq!(kind_of(result), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn too_many_user_roles_is_fatal() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5])]),
            Scripted::returning(&[5, 9]),
            Scripted::returning(&[]),
        );

        let report = engine
            .authorize(Some(USER), None, &[P])
            .await
            .expect_err("contract violation");
        assert!(report.current_context().is_fatal());
    }

    #[tokio::test]
    async fn user_role_outside_filter_is_fatal() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9, 12])]),
            Scripted::returning(&[7]),
            Scripted::holding(&[5]),
        );

        let report = engine
            .authorize(Some(USER), None, &[P])
            .await
            .expect_err("contract violation");
        assert!(report.current_context().is_fatal());
    }

    #[tokio::test]
    async fn too_many_group_roles_is_fatal() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9, 12])]),
            Scripted::returning(&[9]),
            Scripted::returning(&[5, 9, 12]),
        );

        let report = engine
            .authorize(Some(USER), None, &[P])
            .await
            .expect_err("contract violation");
        assert!(report.current_context().is_fatal());
    }

    #[tokio::test]
    async fn contract_violation_in_fan_out_is_internal() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9]), (101, &[5])]),
            Scripted::returning(&[5, 9]),
            Scripted::returning(&[]),
        );

        let report = engine
            .authorize(Some(USER), None, &permissions(&[100, 101]))
            .await
            .expect_err("contract violation");
        assert_eq!(report.current_context().kind(), ErrorKind::Internal);
        assert!(report.current_context().is_fatal());
    }

    #[tokio::test]
    async fn failed_lookup_on_single_path_names_the_operation() {
        let engine = scripted_engine(
            FixedIndex::new(&[]),
            Scripted::returning(&[]),
            Scripted::returning(&[]),
        );

        let report = engine
            .authorize(Some(USER), None, &[P])
            .await
            .expect_err("lookup failure");
        assert_eq!(
            report.current_context(),
            &AuthorizationError::Collaborator {
                operation: "get all role ids by permission id"
            }
        );
    }

    #[tokio::test]
    async fn failed_lookup_in_fan_out_is_generic_lookup_error() {
        let user_roles = Scripted::holding(&[5]);
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5])]),
            user_roles.clone(),
            Scripted::returning(&[]),
        );

        let report = engine
            .authorize(Some(USER), None, &permissions(&[100, 404]))
            .await
            .expect_err("lookup failure");
        assert_eq!(
            report.current_context(),
            &AuthorizationError::Collaborator {
                operation: "get all role ids by permission id"
            }
        );
        assert_eq!(user_roles.calls(), 0);
    }

    #[tokio::test]
    async fn failed_lookup_is_classified_the_same_on_both_paths() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5])]),
            Scripted::holding(&[5]),
            Scripted::returning(&[]),
        );

        let single = engine
            .authorize(Some(USER), None, &permissions(&[404]))
            .await
            .expect_err("lookup failure");
        let fan_out = engine
            .authorize(Some(USER), None, &permissions(&[100, 404]))
            .await
            .expect_err("lookup failure");

        for report in [single, fan_out] {
            let err = report.current_context();
            assert_eq!(err.kind(), ErrorKind::Internal);
            assert!(!err.is_fatal());
        }
    }

    #[tokio::test]
    async fn user_answer_of_filter_length_must_match_filter() {
        let group_roles = Scripted::returning(&[]);
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9])]),
            Scripted::returning(&[5, 7]),
            group_roles.clone(),
        );

        let report = engine
            .authorize(Some(USER), None, &[P])
            .await
            .expect_err("contract violation");
        assert!(report.current_context().is_fatal());
        assert_eq!(group_roles.calls(), 0);
    }

    #[tokio::test]
    async fn failed_assignment_lookup_in_fan_out_is_internal_error() {
        let user_roles = Scripted::new(|filter| {
            if filter.contains(RoleId::new(6)) {
                Err(LookupError::Unavailable {
                    reason: "connection reset".to_string(),
                }
                .into())
            } else {
                Ok(filter.as_slice().to_vec())
            }
        });
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5]), (101, &[6]), (102, &[7])]),
            user_roles.clone(),
            Scripted::returning(&[]),
        );

        let result = engine
            .authorize(Some(USER), None, &permissions(&[100, 101, 102]))
            .await;

        let err = result.expect_err("lookup failure");
        assert_eq!(err.current_context().kind(), ErrorKind::Internal);
        assert!(!err.current_context().is_fatal());
        // Every task ran to completion before the failure was reported.
        assert_eq!(user_roles.calls(), 3);
    }

    #[tokio::test]
    async fn one_empty_filter_denies_the_whole_request() {
        let user_roles = Scripted::holding(&[5]);
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5]), (101, &[])]),
            user_roles.clone(),
            Scripted::returning(&[]),
        );

        let result = engine
            .authorize(Some(USER), None, &permissions(&[100, 101]))
            .await;

        assert_eq!(kind_of(result), ErrorKind::PermissionNotGranted);
        assert_eq!(user_roles.calls(), 0);
    }

    #[tokio::test]
    async fn one_unheld_permission_denies_the_whole_request() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5]), (101, &[6])]),
            Scripted::holding(&[5]),
            Scripted::returning(&[]),
        );

        let result = engine
            .authorize(Some(USER), None, &permissions(&[100, 101]))
            .await;
        assert_eq!(kind_of(result), ErrorKind::PermissionNotGranted);
    }

    #[tokio::test]
    async fn fan_out_keeps_request_order() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9, 12]), (101, &[2, 12]), (102, &[1])]),
            Scripted::holding(&[9, 1]),
            Scripted::holding(&[12]),
        );

        let info = engine
            .authorize(Some(USER), None, &permissions(&[102, 100, 101]))
            .await
            .expect("authorized");

        assert_eq!(
            info.permission_roles(),
            &[
                PermissionWithRoles::new(PermissionId::new(102), roles(&[1])),
                PermissionWithRoles::new(PermissionId::new(100), roles(&[9, 12])),
                PermissionWithRoles::new(PermissionId::new(101), roles(&[12])),
            ]
        );
    }

    #[tokio::test]
    async fn sequential_and_concurrent_paths_agree() {
        let engine = scripted_engine(
            FixedIndex::new(&[(100, &[5, 9, 12])]),
            Scripted::holding(&[9]),
            Scripted::holding(&[12]),
        );

        let single = engine.authorize(Some(USER), None, &[P]).await.expect("authorized");
        let duplicated = engine
            .authorize(Some(USER), None, &[P, P])
            .await
            .expect("authorized");

        assert_eq!(duplicated.permission_roles().len(), 2);
        for entry in duplicated.permission_roles() {
            assert_eq!(entry, &single.permission_roles()[0]);
        }
    }

    #[tokio::test]
    async fn inactive_user_is_invalid_operation() {
        let principals = Arc::new(Principals {
            user: (UserGroup::Users, UserStatus::Disabled),
            client: ClientStatus::Active,
        });
        let user_roles = Scripted::returning(&[5]);
        let engine = AuthorizationEngine::new(
            EngineConfig::default(),
            Collaborators {
                role_permissions: FixedIndex::new(&[(100, &[5])]),
                user_roles: user_roles.clone(),
                group_roles: Scripted::returning(&[]),
                users: principals.clone(),
                clients: principals,
            },
        );

        let report = engine
            .authorize(Some(USER), None, &[P])
            .await
            .expect_err("inactive");
        assert_eq!(
            report.current_context(),
            &AuthorizationError::InvalidUserStatus {
                user_id: USER,
                status: UserStatus::Disabled
            }
        );
        assert_eq!(user_roles.calls(), 0);
    }

    #[tokio::test]
    async fn inactive_client_rejects_an_active_user() {
        let principals = Arc::new(Principals {
            user: (UserGroup::Users, UserStatus::Active),
            client: ClientStatus::Disabled,
        });
        let user_roles = Scripted::returning(&[5]);
        let group_roles = Scripted::returning(&[]);
        let engine = AuthorizationEngine::new(
            EngineConfig::default(),
            Collaborators {
                role_permissions: FixedIndex::new(&[]),
                user_roles: user_roles.clone(),
                group_roles: group_roles.clone(),
                users: principals.clone(),
                clients: principals,
            },
        );

        let client_id = ClientId::new(4);
        let report = engine
            .authorize(Some(USER), Some(client_id), &permissions(&[100, 101]))
            .await
            .expect_err("inactive client");
        assert_eq!(
            report.current_context(),
            &AuthorizationError::InvalidClientStatus {
                client_id,
                status: ClientStatus::Disabled
            }
        );
        assert_eq!(user_roles.calls(), 0);
        assert_eq!(group_roles.calls(), 0);
    }

    async fn memory_engine() -> (AuthorizationEngine, Arc<InMemoryIdentityStore>) {
        let store = Arc::new(InMemoryIdentityStore::new());
        let engine = AuthorizationEngine::new(
            EngineConfig::default(),
            Collaborators::from_store(store.clone()),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn anonymous_caller_is_attributed_the_anonymous_role() {
        let (engine, store) = memory_engine().await;
        store.grant(RoleId::new(1), &permissions(&[10, 11])).await;

        let info = engine
            .authorize(None, None, &permissions(&[10, 11]))
            .await
            .expect("authorized");

        assert_eq!(info.group(), UserGroup::AnonymousUsers);
        assert_eq!(
            info.permission_roles(),
            &[
                PermissionWithRoles::new(PermissionId::new(10), roles(&[1])),
                PermissionWithRoles::new(PermissionId::new(11), roles(&[1])),
            ]
        );
    }

    #[tokio::test]
    async fn anonymous_caller_without_grant_is_denied() {
        let (engine, store) = memory_engine().await;
        store.grant(RoleId::new(1), &permissions(&[10])).await;

        let result = engine.authorize(None, None, &permissions(&[10, 11])).await;
        assert_eq!(kind_of(result), ErrorKind::PermissionNotGranted);
    }

    #[tokio::test]
    async fn anonymous_role_follows_configuration() {
        let store = Arc::new(InMemoryIdentityStore::new());
        store.grant(RoleId::new(77), &permissions(&[10])).await;
        let engine = AuthorizationEngine::new(
            EngineConfig {
                anonymous_role_id: RoleId::new(77),
            },
            Collaborators::from_store(store),
        );
        assert_eq!(engine.config().anonymous_role_id, RoleId::new(77));

        let info = engine
            .authorize(None, None, &permissions(&[10]))
            .await
            .expect("authorized");
        assert_eq!(info.roles_for(PermissionId::new(10)), Some(roles(&[77]).as_slice()));
    }

    #[tokio::test]
    async fn inactive_client_is_rejected_regardless_of_grants() {
        let (engine, store) = memory_engine().await;
        store.grant(RoleId::new(1), &permissions(&[10])).await;
        store.put_client(ClientId::new(3), ClientStatus::LockedOut).await;

        let report = engine
            .authorize(None, Some(ClientId::new(3)), &permissions(&[10]))
            .await
            .expect_err("inactive client");
        assert_eq!(report.current_context().kind(), ErrorKind::InvalidOperation);
    }

    #[tokio::test]
    async fn active_client_is_accepted() {
        let (engine, store) = memory_engine().await;
        store.grant(RoleId::new(1), &permissions(&[10])).await;
        store.put_client(ClientId::new(3), ClientStatus::Active).await;

        let result = engine
            .authorize(None, Some(ClientId::new(3)), &permissions(&[10]))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unknown_client_is_a_lookup_failure() {
        let (engine, store) = memory_engine().await;
        store.grant(RoleId::new(1), &permissions(&[10])).await;

        let result = engine
            .authorize(None, Some(ClientId::new(9)), &permissions(&[10]))
            .await;
        assert_eq!(kind_of(result), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn standard_user_resolves_through_memory_store() {
        let (engine, store) = memory_engine().await;
        let user = UserId::new(20);
        store.put_user(user, UserGroup::Users, UserStatus::Active).await;
        for role in [5, 9, 12] {
            store.grant(RoleId::new(role), &[P]).await;
        }
        store.grant(RoleId::new(3), &permissions(&[200])).await;
        store.assign_to_user(user, RoleId::new(9)).await;
        store.assign_to_user(user, RoleId::new(3)).await;
        store.assign_to_group(UserGroup::Users, RoleId::new(12)).await;
        store.assign_to_group(UserGroup::Admins, RoleId::new(5)).await;

        let info = engine
            .authorize(Some(user), None, &[P, PermissionId::new(200)])
            .await
            .expect("authorized");

        assert_eq!(info.roles_for(P), Some(roles(&[9, 12]).as_slice()));
        assert_eq!(
            info.roles_for(PermissionId::new(200)),
            Some(roles(&[3]).as_slice())
        );
    }

    #[tokio::test]
    async fn engine_is_shared_across_concurrent_calls() {
        let (engine, store) = memory_engine().await;
        for id in 1..=8u64 {
            let user = UserId::new(id);
            store.put_user(user, UserGroup::Users, UserStatus::Active).await;
            store.grant(RoleId::new(100 + id), &[P]).await;
            store.assign_to_user(user, RoleId::new(100 + id)).await;
        }

        let mut handles = Vec::new();
        for id in 1..=8u64 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.authorize(Some(UserId::new(id)), None, &[P]).await
            }));
        }

        for (id, handle) in (1..=8u64).zip(handles) {
            let info = handle.await.expect("join").expect("authorized");
            assert_eq!(info.roles_for(P), Some(roles(&[100 + id]).as_slice()));
        }
    }
}
