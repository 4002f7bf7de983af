//! Command line entry point for baton.
//!
//! Without arguments this runs the producer/consumer pipeline with its
//! default settings (capacity 5, two producers, one consumer, ten seconds).
//! Ctrl-C stops the pipeline early.

use core::time::Duration;
use std::process::ExitCode;

use argh::FromArgs;
use baton::CancellationToken;
use baton::PipelineConfig;
use baton::PipelineReport;
use baton::config;
use tracing::Level;
use tracing::warn;
use tracing_subscriber::fmt::Subscriber;

/// Parallel-programming exercises: a worker pool reduction and a bounded
/// producer/consumer pipeline.
#[derive(FromArgs)]
struct Cli {
    /// log at debug level.
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Pipeline(PipelineCommand),
    Max(MaxCommand),
}

/// Runs the producer/consumer pipeline until the time is up or Ctrl-C.
#[derive(FromArgs)]
#[argh(subcommand, name = "pipeline")]
struct PipelineCommand {
    /// maximum number of items held by the buffer.
    #[argh(option, default = "config::DEFAULT_CAPACITY")]
    capacity: usize,

    /// number of producer threads.
    #[argh(option, default = "config::DEFAULT_PRODUCERS")]
    producers: usize,

    /// number of consumer threads.
    #[argh(option, default = "config::DEFAULT_CONSUMERS")]
    consumers: usize,

    /// seconds to run before stopping.
    #[argh(option, default = "config::DEFAULT_RUN_FOR.as_secs_f64()")]
    seconds: f64,

    /// seed for reproducible items.
    #[argh(option)]
    seed: Option<u64>,
}

impl Default for PipelineCommand {
    fn default() -> PipelineCommand {
        PipelineCommand {
            capacity: config::DEFAULT_CAPACITY,
            producers: config::DEFAULT_PRODUCERS,
            consumers: config::DEFAULT_CONSUMERS,
            seconds: config::DEFAULT_RUN_FOR.as_secs_f64(),
            seed: None,
        }
    }
}

/// Computes the maximum of blocks of integers on a worker pool. Put `--`
/// before the blocks if one starts with a negative number, as in
/// `baton max -- -3,1 2`.
#[derive(FromArgs)]
#[argh(subcommand, name = "max")]
struct MaxCommand {
    /// number of worker threads.
    #[argh(option, default = "4")]
    workers: usize,

    /// blocks of comma-separated integers, for example `3,1,4 1,5,9 2,6`;
    /// use `-- -3,1 2` when a block starts with a negative number.
    #[argh(positional, from_str_fn(parse_block))]
    blocks: Vec<Vec<i32>>,
}

fn parse_block(value: &str) -> Result<Vec<i32>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|number| !number.is_empty())
        .map(|number| {
            number
                .parse()
                .map_err(|err| format!("invalid number `{number}`: {err}"))
        })
        .collect()
}

fn main() -> ExitCode {
    let cli: Cli = argh::from_env();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        None => run_pipeline(PipelineCommand::default()),
        Some(Command::Pipeline(command)) => run_pipeline(command),
        Some(Command::Max(command)) => run_max(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_pipeline(command: PipelineCommand) -> Result<(), baton::Error> {
    let run_for = Duration::try_from_secs_f64(command.seconds)
        .map_err(|_| baton::Error::InvalidConfig("seconds must be a finite, non-negative number"))?;

    let mut config = PipelineConfig::default()
        .with_capacity(command.capacity)
        .with_producers(command.producers)
        .with_consumers(command.consumers)
        .with_run_for(run_for);
    config.seed = command.seed;

    let interrupt = CancellationToken::new();
    let handler_token = interrupt.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        handler_token.cancel();
    }) {
        warn!(%err, "could not install Ctrl-C handler, the pipeline will run for the full duration");
    }

    let report = baton::pipeline::run(&config, &interrupt)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    for task in &report.tasks {
        println!("{}-{}: {} items", task.role, task.index, task.handled);
    }
    println!(
        "produced {}, consumed {}, left in buffer {}, peak {}",
        report.buffer.produced,
        report.buffer.consumed,
        report.left_in_buffer(),
        report.buffer.peak
    );
    if report.failed_tasks > 0 {
        println!("{} task(s) panicked", report.failed_tasks);
    }
}

fn run_max(command: MaxCommand) -> Result<(), baton::Error> {
    let max = baton::reduce_max(command.blocks, command.workers)?;
    println!("{max}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use argh::FromArgs;

    use super::Cli;
    use super::Command;

    fn parse(args: &[&str]) -> Result<Cli, argh::EarlyExit> {
        Cli::from_args(&["baton"], args)
    }

    #[test]
    fn negative_blocks_after_separator() {
        let cli = parse(&["max", "--workers", "2", "--", "-3,1", "2,-8"]).unwrap();
        let Some(Command::Max(command)) = cli.command else {
            panic!("expected the max subcommand");
        };
        assert_eq!(command.workers, 2);
        assert_eq!(command.blocks, [vec![-3, 1], vec![2, -8]]);
    }

    #[test]
    fn negative_block_without_separator_is_a_flag() {
        assert!(parse(&["max", "-3,1"]).is_err());
    }

    #[test]
    fn invalid_number_is_rejected() {
        assert!(parse(&["max", "1,x"]).is_err());
    }

    #[test]
    fn no_subcommand_runs_the_pipeline() {
        assert!(parse(&[]).unwrap().command.is_none());
    }
}
