//! Dwell command line
//!
//! Loads a JSON snapshot of status records, runs one analysis and prints the
//! result as pretty JSON.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dwell_core::{
    EngineConfig, EntityFilter, FixedClock, GroupingDimension, InMemorySource, Orchestrator,
    PageRequest,
};
use dwell_timeline::{normalize, RawDate};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command definition
#[must_use]
pub fn cli() -> Command {
    Command::new("dwell")
        .version(dwell_core::VERSION)
        .about("Time-in-status analytics over entity status records")
        .subcommand_required(true)
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON array of status records"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("now")
                .long("now")
                .global(true)
                .value_parser(parse_now)
                .help("Reference instant; defaults to the current time"),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .global(true)
                .action(ArgAction::Append)
                .help("Only include entities in this current status (repeatable)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(Command::new("overview").about("Population-level status and transition statistics"))
        .subcommand(
            Command::new("timelines")
                .about("Per-entity status timelines")
                .arg(
                    Arg::new("page")
                        .long("page")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Page number, starting at 1"),
                )
                .arg(
                    Arg::new("page-size")
                        .long("page-size")
                        .default_value("50")
                        .value_parser(value_parser!(usize))
                        .help("Entities per page"),
                ),
        )
        .subcommand(
            Command::new("bottlenecks")
                .about("Ranked bottleneck statuses and group heatmap")
                .arg(
                    Arg::new("group-by")
                        .long("group-by")
                        .default_value("project")
                        .value_parser(value_parser!(GroupingDimension))
                        .help("project, objective or account"),
                )
                .arg(
                    Arg::new("min-days")
                        .long("min-days")
                        .value_parser(value_parser!(i64))
                        .help("Minimum total days for a ranked status"),
                ),
        )
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, String> {
    normalize(&RawDate::text(value)).ok_or_else(|| format!("unrecognized date: {value}"))
}

/// Install the stderr log subscriber
///
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run the selected subcommand and render its result
///
/// # Errors
/// Returns an error if inputs cannot be loaded or the source is unavailable
pub async fn run(matches: &ArgMatches) -> Result<String> {
    let input = matches
        .get_one::<PathBuf>("input")
        .context("--input <records.json> is required")?;

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let source = InMemorySource::from_json_file(input)
        .with_context(|| format!("loading records {}", input.display()))?
        .with_vocabulary(config.vocabulary.clone());
    tracing::info!(path = %input.display(), entities = source.len(), "records loaded");

    let mut orchestrator = Orchestrator::new(source, config)?;
    if let Some(now) = matches.get_one::<DateTime<Utc>>("now") {
        orchestrator = orchestrator.with_clock(FixedClock(*now));
    }

    let mut filter = EntityFilter::all();
    if let Some(statuses) = matches.get_many::<String>("status") {
        for status in statuses {
            filter = filter.with_status(status.as_str());
        }
    }

    let rendered = match matches.subcommand() {
        Some(("overview", _)) => serde_json::to_string_pretty(&orchestrator.overview(&filter).await?)?,
        Some(("timelines", args)) => {
            let page = args.get_one::<usize>("page").copied().unwrap_or(1);
            let page_size = args.get_one::<usize>("page-size").copied().unwrap_or(50);
            let analysis = orchestrator
                .entity_timelines(&filter, PageRequest::new(page, page_size))
                .await?;
            serde_json::to_string_pretty(&analysis)?
        }
        Some(("bottlenecks", args)) => {
            let grouping = args
                .get_one::<GroupingDimension>("group-by")
                .copied()
                .unwrap_or(GroupingDimension::Project);
            let min_days = args.get_one::<i64>("min-days").copied();
            let analysis = orchestrator.bottlenecks(&filter, grouping, min_days).await?;
            serde_json::to_string_pretty(&analysis)?
        }
        Some((other, _)) => bail!("unknown subcommand: {other}"),
        None => bail!("no subcommand given"),
    };

    Ok(rendered)
}
