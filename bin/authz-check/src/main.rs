//! Evaluates one authorization request against a grants snapshot.
//!
//! Exit codes: `0` authorized, `1` rejected (denied, invalid input or an
//! inactive principal), `2` internal error (a failed lookup or a broken
//! collaborator contract), `3` setup failure.

mod error;
mod snapshot;

use clap::Parser;
use error::SetupError;
use rootcause::prelude::Report;
use snapshot::Snapshot;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_authz::{
    AuthorizationEngine, AuthorizationError, AuthorizationInfo, Collaborators, EngineConfig,
    ErrorKind,
};
use warden_core::{ClientId, PermissionId, UserId};

/// Check whether a principal holds a set of permissions.
#[derive(Debug, Parser)]
#[command(name = "authz-check")]
#[command(version)]
struct Cli {
    /// Path to the grants snapshot (JSON)
    #[arg(short, long, env = "AUTHZ_SNAPSHOT")]
    snapshot: PathBuf,

    /// Authenticated user; omit to authorize as an anonymous caller
    #[arg(long)]
    user: Option<UserId>,

    /// Client the request comes from
    #[arg(long)]
    client: Option<ClientId>,

    /// Required permissions
    #[arg(required = true)]
    permissions: Vec<PermissionId>,
}

const EXIT_REJECTED: u8 = 1;
const EXIT_INTERNAL: u8 = 2;
const EXIT_SETUP: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(report) => {
            error!(error = %report, "authz-check setup failed");
            ExitCode::from(EXIT_SETUP)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Report<SetupError>> {
    let config = EngineConfig::from_env().map_err(|e| SetupError::Config {
        reason: e.to_string(),
    })?;
    info!(anonymous_role_id = %config.anonymous_role_id, "loaded configuration");

    let store = Arc::new(Snapshot::load(&cli.snapshot)?.into_store().await);
    let engine = AuthorizationEngine::new(config, Collaborators::from_store(store));

    let result = engine
        .authorize(cli.user, cli.client, &cli.permissions)
        .await;

    let (output, code) = match &result {
        Ok(info) => (render_authorized(info)?, ExitCode::SUCCESS),
        Err(report) => {
            let err = report.current_context();
            if err.is_fatal() {
                error!(error = %report, "authorization failed with a fatal error");
            } else if err.kind() == ErrorKind::Internal {
                error!(error = %report, "authorization failed");
            } else {
                warn!(error = %report, "authorization rejected");
            }
            (render_rejected(err), ExitCode::from(exit_code_for(err)))
        }
    };

    println!("{output}");
    Ok(code)
}

/// Maps an authorization failure to the process exit code.
fn exit_code_for(err: &AuthorizationError) -> u8 {
    match err.kind() {
        ErrorKind::Internal => EXIT_INTERNAL,
        ErrorKind::InvalidInput | ErrorKind::InvalidOperation | ErrorKind::PermissionNotGranted => {
            EXIT_REJECTED
        }
    }
}

fn render_authorized(info: &AuthorizationInfo) -> Result<String, Report<SetupError>> {
    serde_json::to_string_pretty(info).map_err(|e| {
        SetupError::Output {
            reason: e.to_string(),
        }
        .into()
    })
}

fn render_rejected(err: &AuthorizationError) -> String {
    serde_json::json!({
        "error": err.to_string(),
        "fatal": err.is_fatal(),
    })
    .to_string()
}
