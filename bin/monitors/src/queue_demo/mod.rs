use monitors_workers::demo::spawn_queue_demo;
use monitors_workers::WorkerGroup;

use crate::setup;
use crate::BoxedError;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(setup::common_args(
        clap::Command::new("queue")
            .about("runs producers and consumers over one bounded queue")
            .arg(
                clap::Arg::new("producers")
                    .long("producers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("consumers")
                    .long("consumers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("capacity")
                    .long("capacity")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            ),
    ))
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let mut config = setup::load_config(args)?;

    if let Some(producers) = args.get_one::<usize>("producers") {
        config.queue.producers = *producers;
    }
    if let Some(consumers) = args.get_one::<usize>("consumers") {
        config.queue.consumers = *consumers;
    }
    if let Some(capacity) = args.get_one::<usize>("capacity") {
        config.queue.capacity = *capacity;
    }
    config.queue.validate()?;

    setup::init_logging(args)?;

    let mut group = WorkerGroup::new();
    let cancel = group.token();
    setup::stop_on_ctrlc(&cancel)?;

    let queue = spawn_queue_demo(&config.queue, &mut group)?;
    setup::wait_for_stop(args, &cancel);

    group.stop();
    queue.close();
    let reports = group.join();

    tracing::info!(left_in_queue = queue.len(), "queue demo stopped");
    setup::print_reports(&reports);
    Ok(())
}
