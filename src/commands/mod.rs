// ABOUTME: Command module aggregator for the slipway CLI.
// ABOUTME: Re-exports create, destroy, and deploy-repo command handlers.

mod create;
mod deploy;
mod destroy;

pub use create::create;
pub use deploy::deploy_repo;
pub use destroy::destroy;

use slipway::config::Settings;
use slipway::error::{Error, Result};

/// Refuse to run provisioning commands as the wrong user.
///
/// Pushes land as the deploy user, so repositories created by anyone else
/// end up unreachable. The original arrangement is a setuid binary owned by
/// the deploy user; `--no-user-warn` skips the check for local testing.
fn ensure_deploy_user(settings: &Settings, no_user_warn: bool) -> Result<()> {
    if no_user_warn {
        return Ok(());
    }

    let current = std::env::var("USER").unwrap_or_default();
    if current != settings.deploy_user {
        return Err(Error::WrongUser {
            expected: settings.deploy_user.clone(),
        });
    }

    Ok(())
}
