//! Engine configuration.
//!
//! Loaded via the `config` crate from `AUTHZ_`-prefixed environment
//! variables, e.g. `AUTHZ_ANONYMOUS_ROLE_ID=1`.

use serde::Deserialize;
use warden_core::RoleId;

/// Authorization engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Role that every anonymous caller holds.
    #[serde(default = "default_anonymous_role_id")]
    pub anonymous_role_id: RoleId,
}

fn default_anonymous_role_id() -> RoleId {
    RoleId::new(1)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anonymous_role_id: default_anonymous_role_id(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix("AUTHZ"))
    }

    fn from_source(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
