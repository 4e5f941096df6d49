use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use mesaboot::bootstrap::{CACHE_ROOT_ENV, interrupt_signal};
use mesaboot::cache::{CacheRetention, LockPolicy};
use mesaboot::cleanup::{SharedCleanupContext, cleanup_shared};
use mesaboot::loader::{NativeLoader, SystemLoader};
use mesaboot::report::BootstrapReport;
use mesaboot::resource::DirSource;
use mesaboot::runtime::RealRuntime;
use mesaboot::{BootstrapConfig, BootstrapError, Bootstrapper};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// mesaboot - extract and load Mesa native payloads
///
/// Copies the payloads of a variant from a resource directory into a shared,
/// versioned cache directory and loads them into this process.
///
/// Examples:
///   mesaboot --resources ./resources            # default variant (llvmpipe)
///   mesaboot d3d12 --resources ./resources --json
#[derive(Parser, Debug)]
#[command(author, version = env!("MESABOOT_VERSION"), about)]
struct Cli {
    /// Variant to load (defaults to llvmpipe)
    #[arg(value_name = "VARIANT")]
    variant: Option<String>,

    /// Resource directory laid out as <arch>/<variant>/<payload> plus version.properties
    #[arg(long, short = 'r', env = "MESABOOT_RESOURCES", value_name = "DIR")]
    resources: PathBuf,

    /// Cache root directory (defaults to the system temp directory)
    #[arg(long, env = CACHE_ROOT_ENV, value_name = "DIR")]
    cache_root: Option<PathBuf>,

    /// Retries while another process holds the cache lock
    #[arg(long, default_value_t = LockPolicy::default().retries)]
    lock_retries: u32,

    /// Seconds between lock attempts
    #[arg(long, value_name = "SECS", default_value = "3", value_parser = parse_interval)]
    lock_interval_secs: Duration,

    /// Extract into a private directory and remove it on exit
    #[arg(long)]
    remove_on_exit: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Override the operating system name reported by the host
    #[arg(long, value_name = "NAME")]
    os: Option<String>,

    /// Override the architecture name reported by the host
    #[arg(long, value_name = "NAME")]
    arch: Option<String>,
}

impl Cli {
    fn config(&self) -> BootstrapConfig {
        BootstrapConfig {
            cache_root: self.cache_root.clone(),
            lock: LockPolicy {
                retries: self.lock_retries,
                interval: self.lock_interval_secs,
            },
            retention: if self.remove_on_exit {
                CacheRetention::RemoveOnExit
            } else {
                CacheRetention::Persistent
            },
            ..BootstrapConfig::default()
        }
    }
}

/// Parse a non-negative, finite number of seconds.
fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", s, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid interval '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let (code, cleanup_ctx) = run(&cli, SystemLoader::new()).await?;

    // The loader is gone by now: libraries are unmapped and their files can be removed
    cleanup_shared(&cleanup_ctx);
    Ok(code)
}

/// Run the bootstrap and print the report. The loader and every library it
/// holds are dropped before this returns.
async fn run<L: NativeLoader>(
    cli: &Cli,
    loader: L,
) -> Result<(ExitCode, SharedCleanupContext)> {
    let runtime = RealRuntime {
        os: cli.os.clone(),
        arch: cli.arch.clone(),
    };
    let bootstrapper = Bootstrapper::new(
        runtime,
        DirSource::new(&cli.resources),
        loader,
        cli.config(),
    );
    let cleanup_ctx = bootstrapper.cleanup_context();

    let result = bootstrapper
        .run(cli.variant.as_deref(), interrupt_signal())
        .await;

    let code = match result {
        Ok(report) => match print_report(&report, cli.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Failed to print report: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Err(BootstrapError::Interrupted) => {
            warn!("{}", BootstrapError::Interrupted);
            ExitCode::from(130) // Standard exit code for Ctrl-C
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    };

    Ok((code, cleanup_ctx))
}

fn print_report(report: &BootstrapReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    info!(
        "Variant {} ({}) in {}",
        report.variant.name,
        report.platform,
        report.cache_dir.display()
    );
    for payload in &report.payloads {
        match payload.failure() {
            None => println!("{}\tloaded", payload.id),
            Some(failure) => println!("{}\tfailed\t{}", payload.id, failure.message),
        }
    }
    Ok(())
}
