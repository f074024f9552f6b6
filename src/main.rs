use anyhow::{Context, Result, anyhow};
use clap::{ArgMatches, Command, arg};
use log::info;
use std::path::PathBuf;
use std::time::Duration;
use timetable_solver::export::{ExportFormat, ExportView};
use timetable_solver::{GenerationConfig, InMemoryStore, ScheduleGenerator};

fn cli() -> Command {
    Command::new("timetable-solver")
        .about("Generates weekly school timetables")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate")
                .about("Generates a timetable and prints the result as json")
                .arg(
                    arg!(<SNAPSHOT> "Path to the data snapshot json file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--config [PATH] "Optional generation config json file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(arg!(--all "Enumerate complete schedules with backtracking"))
                .arg(arg!(--optimize "Improve the schedule with local search"))
                .arg(
                    arg!(--"max-iterations" [N] "Optimizer iteration cap (1-1000)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--timeout [SECS] "Optimizer time limit in seconds (10-3600)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--limit [N] "Number of schedules to return in --all mode")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(arg!(--seed [SEED] "Optimizer random seed").value_parser(clap::value_parser!(u64)))
                .arg(arg!(--strict "Fail the run when a lesson has no slot row to save into"))
                .arg(
                    arg!(--output [PATH] "Write the updated snapshot to this file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"poll-ms" [MS] "Status polling interval")
                        .default_value("250")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Prints the timetable stored in a snapshot")
                .arg(
                    arg!(<SNAPSHOT> "Path to the data snapshot json file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--format [FORMAT] "json or csv")
                        .default_value("json")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(arg!(--"by-teacher" "Organise the timetable by teacher")),
        )
}

fn generation_config(matches: &ArgMatches) -> Result<GenerationConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => GenerationConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => GenerationConfig::default(),
    };
    if matches.get_flag("all") {
        config.get_all_schedules = true;
    }
    if matches.get_flag("optimize") {
        config.optimize = true;
    }
    if matches.get_flag("strict") {
        config.strict_integrity = true;
    }
    if let Some(n) = matches.get_one::<u32>("max-iterations") {
        config.max_iterations = *n;
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config.timeout = *secs;
    }
    if let Some(n) = matches.get_one::<usize>("limit") {
        config.requested_schedules = *n;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(*seed);
    }
    config.validate()?;
    Ok(config)
}

async fn generate(matches: &ArgMatches) -> Result<()> {
    let snapshot_path = matches
        .get_one::<PathBuf>("SNAPSHOT")
        .ok_or_else(|| anyhow!("SNAPSHOT is required"))?;
    let config = generation_config(matches)?;
    let store = InMemoryStore::from_json_file(snapshot_path)
        .with_context(|| format!("reading snapshot {}", snapshot_path.display()))?;
    let poll = Duration::from_millis(*matches.get_one::<u64>("poll-ms").unwrap_or(&250));

    let job = ScheduleGenerator::new(store, config)?.spawn();
    let mut ticker = tokio::time::interval(poll);
    let mut last_message = String::new();
    while !job.is_finished() {
        ticker.tick().await;
        let status = job.status().snapshot();
        if status.message != last_message {
            info!("[{:>3}%] {}", status.percent, status.message);
            last_message = status.message;
        }
    }

    let (result, store) = job.wait().await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(output) = matches.get_one::<PathBuf>("output") {
        store
            .write_json_file(output)
            .with_context(|| format!("writing snapshot {}", output.display()))?;
        info!("Updated snapshot written to {}", output.display());
    }
    Ok(())
}

fn export(matches: &ArgMatches) -> Result<()> {
    let snapshot_path = matches
        .get_one::<PathBuf>("SNAPSHOT")
        .ok_or_else(|| anyhow!("SNAPSHOT is required"))?;
    let format: ExportFormat = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("json")
        .parse()?;
    let view = if matches.get_flag("by-teacher") {
        ExportView::ByTeacher
    } else {
        ExportView::BySection
    };

    let store = InMemoryStore::from_json_file(snapshot_path)
        .with_context(|| format!("reading snapshot {}", snapshot_path.display()))?;
    let generator = ScheduleGenerator::new(store, GenerationConfig::default())?;
    println!("{}", generator.export(format, view)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let outcome = match matches.subcommand() {
        Some(("generate", sub)) => generate(sub).await,
        Some(("export", sub)) => export(sub),
        _ => Err(anyhow!("Invalid subcommand")),
    };
    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
