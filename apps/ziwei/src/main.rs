use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use ziwei_config::ZiweiSettings;
use ziwei_core::{input, locate_provider, DynamicProvider, InputDefaults};

#[derive(Parser, Debug)]
#[command(author, version, about = "Cast a Zi Wei Dou Shu chart and print the report as JSON")]
struct Args {
    /// Request document: `{ "birth": {...}, "query": {...} }`
    input: PathBuf,

    /// Chart library to load (overrides ZIWEI_PROVIDER_LIB and the config file).
    #[arg(long)]
    provider: Option<PathBuf>,

    /// Config file (default: ./ziwei.toml, then ./configs/ziwei.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report on one line instead of indented.
    #[arg(long)]
    compact: bool,
}

fn run(args: &Args) -> anyhow::Result<()> {
    let settings: ZiweiSettings = ziwei_config::load_settings(args.config.as_deref())?;
    let defaults = InputDefaults {
        timezone: settings.default_timezone.clone(),
        language: settings.default_language.clone(),
    };

    // Library first: a missing or incompatible library stops the run before any input work
    let explicit = args.provider.clone().or_else(|| settings.provider_path.clone());
    let search_dirs = ziwei_config::provider_search_dirs(&settings);
    let path = locate_provider(explicit.as_deref(), &search_dirs)?;
    let provider = unsafe { DynamicProvider::load(&path)? };

    let now = Utc::now();
    let raw = input::load_input(&args.input)?;
    let request = input::normalize_input(&raw, &defaults, now)?;
    log::debug!("Normalized request: {:?}", request);

    let report = ziwei_core::build_report(&provider, &request, now)?;
    let json = if args.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    }
    .context("Failed to serialize report")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json).context("Failed to write report")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
