// UI layer: the interactive flow. Prompts use `dialoguer`, progress uses
// `indicatif`; the work itself is delegated to `selector` and `builder`.

use crate::api::{ApiClient, Endpoint, HttpTransport};
use crate::builder::{BuildReport, SurveyBuilder};
use crate::config::Settings;
use crate::retry::RetryPolicy;
use crate::roster::{output_path_for, read_roster, ResultWriter};
use crate::selector::{menu_lines, resolve_selection, search_templates, TemplateCandidate};
use anyhow::{bail, Result};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

const STAT_WAIT: &str = ", please wait...";

/// Paths and answers that may come from the command line instead of the
/// usual defaults and prompts.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: PathBuf,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub query: Option<String>,
}

/// Ask for the template search string.
pub fn prompt_query() -> Result<String> {
    let query: String = Input::new()
        .with_prompt("Specify template survey name (partial okay)")
        .interact_text()?;
    Ok(query)
}

/// Print the numbered menu and ask which template to copy from.
pub fn prompt_template(candidates: &[TemplateCandidate]) -> Result<TemplateCandidate> {
    for line in menu_lines(candidates) {
        println!("{}", line);
    }
    let answer: String = Input::new()
        .with_prompt("Please confirm survey to copy from")
        .allow_empty(true)
        .interact_text()?;
    Ok(resolve_selection(candidates, &answer)?.clone())
}

/// Whole run: config, roster, template choice, build, report.
pub fn run(options: RunOptions) -> Result<BuildReport> {
    let settings = Settings::load(&options.config)?;
    let rows = read_roster(&options.input)?;
    let output = options.output.clone().unwrap_or_else(|| output_path_for(&options.input));
    log::info!("{} roster rows read from {}", rows.len(), options.input.display());

    let api = ApiClient::<HttpTransport>::from_credentials(
        &settings.surveymonkey,
        RetryPolicy::new(settings.retry.clone()),
    )?;

    let query = match options.query {
        Some(q) => q,
        None => prompt_query()?,
    };

    println!("Looking for survey templates{}", STAT_WAIT);
    let surveys = Endpoint::public(settings.endpoints.api_url.as_str());
    let candidates = search_templates(&api, &surveys, &query, settings.search.per_page)?;
    let template = prompt_template(&candidates)?;
    println!("Copying from '{}' ({})", template.title, template.id);

    let mut writer = ResultWriter::create(&output)?;
    let builder = SurveyBuilder::new(&api, &settings, template.id);

    let bar = ProgressBar::new(rows.len() as u64);
    bar.set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(120));

    let report = builder.build_all(&rows, &mut writer, |n, total, row| {
        bar.set_position((n - 1) as u64);
        bar.set_message(format!(
            "Building new survey: #{} of {} - {} ({}){}",
            n, total, row.title, row.slug, STAT_WAIT
        ));
    })?;
    bar.set_position(report.built as u64 + report.failed as u64);
    bar.finish_and_clear();

    println!(
        "{} built, {} failed, results written to {}",
        report.built,
        report.failed,
        output.display()
    );

    if let Some(reason) = &report.aborted {
        bail!("Batch stopped early, remaining rows were not attempted: {}", reason);
    }
    Ok(report)
}
