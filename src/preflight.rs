//! Environment checks run before touching any stack

use crate::cloud::{CallerIdentity, Clients, IdentityApi};
use crate::error::{Error, Result};
use crate::runner::CommandRunner;
use tracing::info;
use trustbucket_config::Backend;

/// The `aws` binary runs
pub async fn check_cli(runner: &CommandRunner) -> Result<String> {
    let version = runner
        .run("aws --version", "Checking AWS CLI")
        .await
        .map_err(|e| Error::CliUnavailable {
            reason: e.to_string(),
        })?;
    let version = version.trim().to_string();
    info!(version = %version, "AWS CLI available");
    Ok(version)
}

/// The configured credentials resolve to an identity
pub async fn check_credentials(identity: &dyn IdentityApi) -> Result<CallerIdentity> {
    let caller = identity.caller_identity().await.map_err(|e| match e {
        Error::CredentialsUnavailable { .. } => e,
        other => Error::CredentialsUnavailable {
            reason: other.to_string(),
        },
    })?;
    info!(account = %caller.account, arn = %caller.arn, "AWS credentials OK");
    Ok(caller)
}

/// Run every check that applies to the selected backend
pub async fn run(clients: &Clients) -> Result<CallerIdentity> {
    if clients.backend == Backend::Cli {
        check_cli(&clients.runner).await?;
    }
    check_credentials(clients.identity.as_ref()).await
}
