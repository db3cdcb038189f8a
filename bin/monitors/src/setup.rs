use std::time::Duration;

use foundation_sync::CancelToken;
use monitors_workers::config::DemoConfig;
use monitors_workers::WorkerReport;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::BoxedError;

/// Flags both subcommands share.
pub fn common_args(command: clap::Command) -> clap::Command {
    command
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .help("TOML file with [queue] and [guard] sections"),
        )
        .arg(
            clap::Arg::new("duration_secs")
                .long("duration-secs")
                .action(clap::ArgAction::Set)
                .value_parser(clap::value_parser!(u64))
                .help("stop after this many seconds instead of waiting for Ctrl-C"),
        )
}

/// Loads the `--config` file, or the defaults when none was given.
pub fn load_config(args: &clap::ArgMatches) -> std::result::Result<DemoConfig, BoxedError> {
    match args.get_one::<std::path::PathBuf>("config") {
        Some(path) => Ok(DemoConfig::from_path(path.clone())?),
        None => Ok(DemoConfig::default()),
    }
}

pub fn init_logging(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let level = if args.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_thread_names(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Fires `cancel` on Ctrl-C.
pub fn stop_on_ctrlc(cancel: &CancelToken) -> std::result::Result<(), BoxedError> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        if cancel.cancel() {
            tracing::info!("Ctrl-C received, stopping workers");
        }
    })?;
    Ok(())
}

/// Blocks until `cancel` fires or the optional `--duration-secs` elapses.
pub fn wait_for_stop(args: &clap::ArgMatches, cancel: &CancelToken) {
    match args.get_one::<u64>("duration_secs") {
        Some(secs) => {
            if !cancel.wait_timeout(Duration::from_secs(*secs)) {
                tracing::info!(secs, "demo duration elapsed, stopping workers");
            }
        }
        None => cancel.wait(),
    }
}

pub fn print_reports(reports: &[WorkerReport]) {
    println!("\nworker reports:");
    for report in reports {
        println!("  {report}");
    }
}
