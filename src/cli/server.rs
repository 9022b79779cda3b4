//! Server command.
//!
//! Provisions the data directory, runs the startup steps, then launches and
//! supervises the HTTP server process.

use crate::cli::{output, ServerArgs};
use crate::core::bootstrap::{Bootstrap, BootstrapOptions, StartupStep, StepObserver};
use crate::core::settings::RuntimeEnvironment;
use crate::core::supervisor::{LaunchSpec, Outcome, Supervisor};
use crate::error::Result;
use crate::server::reload;

/// Start the server and return the exit code the process should report.
pub fn execute(args: ServerArgs, env: RuntimeEnvironment) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args, env))
}

async fn run(args: ServerArgs, env: RuntimeEnvironment) -> Result<i32> {
    let bootstrap = Bootstrap::provision(env)?;

    output::kv("data directory:", output::path(bootstrap.data_dir()));
    output::kv(
        "API token:     ",
        bootstrap.settings().api_token().unwrap_or("not set"),
    );
    for name in bootstrap.generated() {
        output::dimmed(&format!("  generated {}", name));
    }
    println!();

    let options = BootstrapOptions {
        skip_migrations: args.skip_migrations,
        skip_static_collection: args.skip_collectstatic,
    };
    let env = bootstrap.prepare(options, &mut Progress).await?;

    if args.reload {
        output::warn("--reload restarts on every rebuild; do not use it in production");
    }

    let exe = reload::current_exe()?;
    let spec = LaunchSpec::server(exe, &args.host, args.port, usize::from(args.workers), args.reload);

    println!();
    output::success(&format!("Starting server at http://{}:{}", args.host, args.port));
    output::dimmed("Press Ctrl+C to stop.");
    println!();

    let outcome = Supervisor::new().run(&spec, &env).await?;
    match outcome {
        Outcome::Interrupted => {
            println!();
            output::success("server stopped");
        }
        Outcome::Exited(0) => output::dimmed("server exited"),
        Outcome::Exited(code) => output::error(&format!("server exited with error: {}", code)),
    }

    Ok(outcome.exit_code())
}

/// Prints one `Label... ok` line per startup step.
struct Progress;

impl StepObserver for Progress {
    fn started(&mut self, step: StartupStep) {
        output::progress(match step {
            StartupStep::Migrate => "Running migrations",
            StartupStep::CollectStatic => "Collecting static files",
        });
    }

    fn finished(&mut self, _step: StartupStep, ok: bool) {
        output::progress_done(ok);
    }
}
