mod guard_demo;
mod queue_demo;
mod setup;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> std::result::Result<(), BoxedError> {
    let commander = guard_demo::register(queue_demo::register(
        clap::Command::new("monitors")
            .about("Runs producer/consumer and reader/writer demos over shared monitors")
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .short('v')
                    .global(true)
                    .action(clap::ArgAction::SetTrue)
                    .help("log worker stop reasons and other debug events"),
            ),
    ));

    let matches = commander.get_matches();
    match matches.subcommand() {
        Some(("queue", arguments)) => queue_demo::run(arguments)?,
        Some(("guard", arguments)) => guard_demo::run(arguments)?,
        _ => {}
    }

    Ok(())
}
