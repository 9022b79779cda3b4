//! Maintenance commands: migrate, collectstatic, token.
//!
//! Each provisions the data directory first, exactly like `server` does, so
//! they can run before the server has ever started.

use crate::cli::output;
use crate::core::bootstrap::Bootstrap;
use crate::core::settings::RuntimeEnvironment;
use crate::error::{ConfigError, Result};

/// Apply pending database migrations.
pub fn migrate(env: RuntimeEnvironment) -> Result<()> {
    let bootstrap = Bootstrap::provision(env)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(bootstrap.migrate())?;

    output::success(&format!(
        "migrations applied to {}",
        output::path(&bootstrap.settings().database_path)
    ));
    Ok(())
}

/// Copy bundled static assets into the static root.
pub fn collectstatic(env: RuntimeEnvironment) -> Result<()> {
    let bootstrap = Bootstrap::provision(env)?;
    let summary = bootstrap.collect_static()?;

    output::success(&format!(
        "{} static files copied, {} unchanged",
        summary.copied, summary.unchanged
    ));
    Ok(())
}

/// Print the API token, provisioning it if needed.
///
/// Prints the bare token so it can be captured by scripts.
pub fn token(env: RuntimeEnvironment) -> Result<()> {
    let bootstrap = Bootstrap::provision(env)?;
    let token = bootstrap
        .settings()
        .api_token()
        .ok_or(ConfigError::MissingSecret(crate::core::constants::API_TOKEN_VAR))?;

    println!("{}", token);
    Ok(())
}
