// Roster input and result output. The roster is the session list exported
// from the event planning sheet; the output mirrors it with the new survey
// ids so the links can be handed out.

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// One session to build a survey for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterRow {
    #[serde(rename = "Session Title")]
    pub title: String,
    #[serde(rename = "Presented By")]
    pub presenter: String,
    #[serde(rename = "Survey URL")]
    pub slug: String,
}

/// A survey that made it through every build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltSurvey {
    pub title: String,
    pub presenter: String,
    pub slug: String,
    pub id: String,
}

/// What happened to one roster row. A failed row keeps the id of the
/// survey it created, if it got that far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Built(BuiltSurvey),
    Failed {
        row: RosterRow,
        survey_id: Option<String>,
        error: String,
    },
}

/// Flat shape of an output line; field names become the header.
#[derive(Debug, Serialize)]
struct OutputRecord<'a> {
    title: &'a str,
    presenter: &'a str,
    slug: &'a str,
    id: &'a str,
    status: &'a str,
    error: &'a str,
}

impl OutputRecord<'_> {
    const HEADER: [&'static str; 6] = ["title", "presenter", "slug", "id", "status", "error"];
}

impl<'a> From<&'a RowOutcome> for OutputRecord<'a> {
    fn from(outcome: &'a RowOutcome) -> Self {
        match outcome {
            RowOutcome::Built(s) => OutputRecord {
                title: &s.title,
                presenter: &s.presenter,
                slug: &s.slug,
                id: &s.id,
                status: "built",
                error: "",
            },
            RowOutcome::Failed { row, survey_id, error } => OutputRecord {
                title: &row.title,
                presenter: &row.presenter,
                slug: &row.slug,
                id: survey_id.as_deref().unwrap_or(""),
                status: "failed",
                error,
            },
        }
    }
}

/// Parse roster CSV from any reader. Cells are trimmed; a row missing its
/// title or slug is rejected with its line number.
pub fn parse_roster<R: Read>(reader: R) -> Result<Vec<RosterRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize().enumerate() {
        // +2: header line and 1-based numbering
        let line = index + 2;
        let row: RosterRow = result.with_context(|| format!("Roster line {}", line))?;
        if row.title.is_empty() {
            bail!("Roster line {}: empty 'Session Title'", line);
        }
        if row.slug.is_empty() {
            bail!("Roster line {}: empty 'Survey URL'", line);
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_roster(path: &Path) -> Result<Vec<RosterRow>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open roster file {}", path.display()))?;
    parse_roster(file).with_context(|| format!("Invalid roster file {}", path.display()))
}

/// `sessions.csv` -> `sessions_output.csv`, next to the input.
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("survey_bulk_adder");
    input.with_file_name(format!("{}_output.csv", stem))
}

/// Appends outcomes to the output CSV, flushing after every row so a run
/// that dies midway still leaves the finished rows on disk.
pub struct ResultWriter<W: Write> {
    writer: csv::Writer<W>,
    written: usize,
}

impl ResultWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        ResultWriter::new(file)
    }
}

impl<W: Write> ResultWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(OutputRecord::HEADER).context("Writing output header")?;
        writer.flush().context("Flushing output file")?;
        Ok(ResultWriter { writer, written: 0 })
    }

    pub fn record(&mut self, outcome: &RowOutcome) -> Result<()> {
        self.writer
            .serialize(OutputRecord::from(outcome))
            .context("Writing output row")?;
        self.writer.flush().context("Flushing output file")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Flushing output file: {}", e.error()))
    }
}
