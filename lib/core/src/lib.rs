//! Core identifier types for warden.
//!
//! This crate provides the strongly typed ids shared by the authorization
//! engine and its callers.

pub mod id;

pub use id::{ClientId, OperationId, ParseIdError, PermissionId, RoleId, UserId};
