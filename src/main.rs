// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, set up logging, hand off to `ui::run`.
// - Any fatal condition surfaces as an `anyhow` error and a non-zero exit.

use clap::Parser;
use std::path::PathBuf;
use survey_bulk_adder::{config::Settings, ui};

/// Bulk builds new surveys in SurveyMonkey based on a template survey.
#[derive(Parser, Debug)]
#[command(name = "survey-bulk-adder", version, about)]
struct Cli {
    /// Config file with API token and admin UI session (default: ~/Personal-Local/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Roster CSV with `Session Title`, `Presented By` and `Survey URL` columns
    #[arg(long, default_value = "./survey_bulk_adder.csv")]
    input: PathBuf,

    /// Result CSV (default: <input>_output.csv next to the input)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Template search string; prompted for when omitted
    #[arg(long)]
    query: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let options = ui::RunOptions {
        config: cli.config.unwrap_or_else(Settings::default_path),
        input: cli.input,
        output: cli.output,
        query: cli.query,
    };

    ui::run(options)?;
    Ok(())
}
