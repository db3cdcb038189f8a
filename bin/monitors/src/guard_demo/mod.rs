use foundation_sync::CancelToken;
use monitors_workers::demo::spawn_guard_demo;
use monitors_workers::WorkerGroup;

use crate::setup;
use crate::BoxedError;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(setup::common_args(
        clap::Command::new("guard")
            .about("runs readers and writers over one guarded value")
            .arg(
                clap::Arg::new("readers")
                    .long("readers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("writers")
                    .long("writers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            ),
    ))
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let mut config = setup::load_config(args)?;

    if let Some(readers) = args.get_one::<usize>("readers") {
        config.guard.readers = *readers;
    }
    if let Some(writers) = args.get_one::<usize>("writers") {
        config.guard.writers = *writers;
    }
    config.guard.validate()?;

    setup::init_logging(args)?;

    let mut group = WorkerGroup::new();
    let cancel = group.token();
    setup::stop_on_ctrlc(&cancel)?;

    let guard = spawn_guard_demo(&config.guard, &mut group)?;
    setup::wait_for_stop(args, &cancel);

    let reports = group.shutdown();

    // the group token has fired by now
    let last = guard.read_value(&CancelToken::new());
    tracing::info!(last_value = ?last, "guard demo stopped");
    setup::print_reports(&reports);
    Ok(())
}
