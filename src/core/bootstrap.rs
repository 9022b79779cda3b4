//! Startup preparation.
//!
//! Turns the persisted secrets of a data directory into the environment the
//! server process runs with, then performs the idempotent startup steps
//! (schema migration, static collection) that must succeed before the
//! server may accept traffic.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::assets::{self, CollectSummary};
use crate::core::constants::{DATA_DIR_VAR, ENV_FILE, SETTINGS_VAR};
use crate::core::secrets;
use crate::core::settings::{default_settings_path, resolve_data_dir, RuntimeEnvironment, Settings};
use crate::core::store;
use crate::error::{Result, StoreError};

/// Which startup steps to skip.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOptions {
    pub skip_migrations: bool,
    pub skip_static_collection: bool,
}

/// An idempotent step run before the server may accept traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStep {
    Migrate,
    CollectStatic,
}

/// Notified around each startup step, e.g. to show progress.
pub trait StepObserver {
    fn started(&mut self, _step: StartupStep) {}
    fn finished(&mut self, _step: StartupStep, _ok: bool) {}
}

impl StepObserver for () {}

/// A provisioned data directory and the environment derived from it.
#[derive(Debug)]
pub struct Bootstrap {
    env: RuntimeEnvironment,
    data_dir: PathBuf,
    generated: BTreeSet<String>,
    settings: Settings,
}

impl Bootstrap {
    /// Resolve and create the data directory, provision its secrets, and
    /// merge them into `external` without overriding anything it already
    /// holds.
    ///
    /// # Errors
    ///
    /// Fails if the data directory or secrets file cannot be written, or
    /// if the resulting settings are invalid.
    pub fn provision(external: RuntimeEnvironment) -> Result<Self> {
        let mut env = external;
        let data_dir = ensure_data_dir(&env)?;

        let provisioned = secrets::load_or_provision(&data_dir.join(ENV_FILE))?;
        let added = env.merge_defaults(provisioned.record.iter());
        debug!(added = ?added, "merged secrets into environment");

        env.set_default(DATA_DIR_VAR, data_dir.to_string_lossy().into_owned());
        env.set_default(
            SETTINGS_VAR,
            default_settings_path(&data_dir)
                .to_string_lossy()
                .into_owned(),
        );

        let settings = Settings::from_env(&env)?;

        Ok(Self {
            env,
            data_dir,
            generated: provisioned.generated,
            settings,
        })
    }

    pub fn env(&self) -> &RuntimeEnvironment {
        &self.env
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Secret names generated by this run.
    pub fn generated(&self) -> &BTreeSet<String> {
        &self.generated
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Apply database migrations.
    ///
    /// # Errors
    ///
    /// Any failure aborts startup; the server must not run on an unknown
    /// schema.
    pub async fn migrate(&self) -> Result<()> {
        let pool = store::connect(&self.settings.database_path, 1).await?;
        let result = store::migrate(&pool).await;
        pool.close().await;
        result?;
        info!(database = %self.settings.database_path.display(), "migrations applied");
        Ok(())
    }

    /// Collect bundled static assets into the static root.
    pub fn collect_static(&self) -> Result<CollectSummary> {
        let summary = assets::collect(&self.settings.static_root)?;
        info!(
            copied = summary.copied,
            unchanged = summary.unchanged,
            root = %self.settings.static_root.display(),
            "static files collected"
        );
        Ok(summary)
    }

    /// Run every startup step not skipped by `options`, in order,
    /// reporting each one to `observer`.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step; nothing is retried.
    pub async fn run_steps(
        &self,
        options: BootstrapOptions,
        observer: &mut dyn StepObserver,
    ) -> Result<()> {
        if options.skip_migrations {
            debug!("skipping migrations");
        } else {
            observer.started(StartupStep::Migrate);
            let result = self.migrate().await;
            observer.finished(StartupStep::Migrate, result.is_ok());
            result?;
        }

        if options.skip_static_collection {
            debug!("skipping static collection");
        } else {
            observer.started(StartupStep::CollectStatic);
            let result = self.collect_static();
            observer.finished(StartupStep::CollectStatic, result.is_ok());
            result?;
        }

        Ok(())
    }

    /// Run the startup steps and hand back the environment the server
    /// process must be launched with.
    pub async fn prepare(
        self,
        options: BootstrapOptions,
        observer: &mut dyn StepObserver,
    ) -> Result<RuntimeEnvironment> {
        self.run_steps(options, observer).await?;
        Ok(self.env)
    }
}

/// Resolve the data directory and make sure it exists.
pub fn ensure_data_dir(env: &RuntimeEnvironment) -> Result<PathBuf> {
    let dir = resolve_data_dir(env)?;
    std::fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
