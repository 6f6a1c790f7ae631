//! insight-agent command-line binary

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use insight_agent::commands::{self, EXIT_FAILURE, EXIT_INPUT_ERROR};
use insight_agent::{metrics_file, telemetry, AgentConfig};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

fn cli() -> Command {
    Command::new("insight-agent")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate scored business insights from metric batches")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Increase log verbosity"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("run")
                .about("Run the workflow over a metric batch file")
                .arg(
                    Arg::new("metrics")
                        .long("metrics")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of metric records"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("deadline-secs")
                        .long("deadline-secs")
                        .value_parser(value_parser!(u64))
                        .help("Deadline for the whole run"),
                )
                .arg(
                    Arg::new("max-retries")
                        .long("max-retries")
                        .value_parser(value_parser!(u32))
                        .help("Regeneration budget"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("score")
                .about("Score and classify insight lines (arguments or stdin)")
                .arg(Arg::new("text").num_args(0..).help("Insight lines"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a configuration file")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let verbosity = matches.get_count("verbose");
    if let Err(e) = telemetry::init(verbosity, matches.get_flag("log-json")) {
        eprintln!("failed to initialise logging: {e:#}");
    }

    let code = match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("score", args)) => score(args),
        Some(("check-config", args)) => check_config(args),
        _ => EXIT_FAILURE,
    };
    std::process::exit(code);
}

async fn run(args: &ArgMatches) -> i32 {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => match AgentConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e:#}");
                return EXIT_FAILURE;
            }
        },
        None => AgentConfig::default(),
    };
    if let Some(max_retries) = args.get_one::<u32>("max-retries") {
        config.workflow.max_retries = *max_retries;
    }
    let deadline = args
        .get_one::<u64>("deadline-secs")
        .map(|secs| Duration::from_secs(*secs));

    let Some(metrics_path) = args.get_one::<PathBuf>("metrics") else {
        return EXIT_INPUT_ERROR;
    };
    let records = match metrics_file::load(metrics_path) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_INPUT_ERROR;
        }
    };

    let generator = match commands::build_generator(&config.llm) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_FAILURE;
        }
    };

    match commands::run_batch(&config, Arc::new(generator), records, deadline).await {
        Ok(report) => {
            info!(
                batch = %report.batch_id,
                insights = report.insights.len(),
                confidence = report.confidence.value(),
                "run finished"
            );
            if args.get_flag("json") {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return EXIT_FAILURE;
                    }
                }
            } else {
                print!("{}", commands::render_run(&report));
            }
            0
        }
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "run failed");
            eprintln!("error: {e}");
            commands::exit_code(&e)
        }
    }
}

fn score(args: &ArgMatches) -> i32 {
    let lines: Vec<String> = match args.get_many::<String>("text") {
        Some(values) => values.cloned().collect(),
        None => match io::stdin().lock().lines().collect::<Result<Vec<_>, _>>() {
            Ok(lines) => lines,
            Err(e) => {
                eprintln!("error: failed to read stdin: {e}");
                return EXIT_INPUT_ERROR;
            }
        },
    };

    let report = commands::score_lines(&lines);
    if args.get_flag("json") {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: {e}");
                return EXIT_FAILURE;
            }
        }
    } else {
        print!("{}", commands::render_score(&report));
    }
    0
}

fn check_config(args: &ArgMatches) -> i32 {
    let Some(path) = args.get_one::<PathBuf>("config") else {
        return EXIT_INPUT_ERROR;
    };
    match AgentConfig::load(path) {
        Ok(config) => {
            println!("Configuration OK");
            println!("  model: {} at {}", config.llm.model, config.llm.base_url);
            println!(
                "  max_retries: {}  generate_attempts: {}",
                config.workflow.max_retries, config.workflow.generate_attempts
            );
            0
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_FAILURE
        }
    }
}
