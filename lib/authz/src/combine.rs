//! Sorted-merge helpers for combining user and group role assignments.
//!
//! Every list here is ascending and duplicate-free, and so is every result.

use crate::error::AuthorizationError;
use rootcause::prelude::Report;
use warden_core::RoleId;

/// Returns the ids of `role_filter` that are not in `user_roles`.
///
/// `user_roles` must be an ascending subsequence of `role_filter` that is
/// strictly shorter than it. The remainder has exactly
/// `role_filter.len() - user_roles.len()` entries; an id that fits neither
/// list means the user lookup returned something outside the filter.
pub(crate) fn unmatched_roles(
    role_filter: &[RoleId],
    user_roles: &[RoleId],
) -> Result<Vec<RoleId>, Report<AuthorizationError>> {
    if user_roles.len() > role_filter.len() {
        return Err(AuthorizationError::internal(
            "number of user's roles is greater than the roles in the filter",
        )
        .into());
    }

    let capacity = role_filter.len() - user_roles.len();
    if user_roles.is_empty() {
        return Ok(role_filter.to_vec());
    }

    let mut remainder = Vec::with_capacity(capacity);
    let mut matched = 0;

    for &id in role_filter {
        // Once every user role is matched, the rest of the filter is remainder.
        if matched < user_roles.len() && user_roles[matched] == id {
            matched += 1;
            continue;
        }
        if remainder.len() == capacity {
            return Err(AuthorizationError::internal("invalid user's roles").into());
        }
        remainder.push(id);
    }

    Ok(remainder)
}

/// Merges user roles with the group roles found among `remainder`.
///
/// `group_roles` must be an ascending subsequence of `remainder`; the result
/// is ascending and duplicate-free because `remainder` and `user_roles` are
/// disjoint parts of the same filter.
pub(crate) fn merge_group_roles(
    user_roles: &[RoleId],
    remainder: &[RoleId],
    group_roles: &[RoleId],
) -> Result<Vec<RoleId>, Report<AuthorizationError>> {
    if group_roles.len() > remainder.len() {
        return Err(AuthorizationError::internal(
            "number of group roles is greater than the roles in the filter",
        )
        .into());
    }

    let mut candidates = remainder.iter();
    for id in group_roles {
        if !candidates.any(|candidate| candidate == id) {
            return Err(AuthorizationError::internal("invalid group roles").into());
        }
    }

    let mut combined = Vec::with_capacity(user_roles.len() + group_roles.len());
    let (mut u, mut g) = (0, 0);
    while u < user_roles.len() && g < group_roles.len() {
        if user_roles[u] < group_roles[g] {
            combined.push(user_roles[u]);
            u += 1;
        } else {
            combined.push(group_roles[g]);
            g += 1;
        }
    }
    combined.extend_from_slice(&user_roles[u..]);
    combined.extend_from_slice(&group_roles[g..]);

    Ok(combined)
}
