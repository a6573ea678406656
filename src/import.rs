//! CSV catalog import.
//!
//! Expected header: id,title,description,difficulty,acceptance_rate,frequency,related_topics,asked_by_faang

use std::{io::Read, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::{Difficulty, Problem};
use crate::error::StoreError;
use crate::store::Catalog;

#[derive(Debug, Error)]
pub enum ImportError {
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("row {row}: {detail}")]
  InvalidRow { row: usize, detail: String },

  #[error(transparent)]
  Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
  id: i64,
  title: String,
  #[serde(default)] description: String,
  difficulty: String,
  #[serde(default)] acceptance_rate: String,
  #[serde(default)] frequency: String,
  #[serde(default)] related_topics: String,
  #[serde(default)] asked_by_faang: String,
}

/// Parse every row; the first invalid row aborts the whole import.
pub fn parse_problems<R: Read>(reader: R) -> Result<Vec<Problem>, ImportError> {
  let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
  let mut out = Vec::new();
  for (i, rec) in rdr.deserialize::<CsvRow>().enumerate() {
    // header is line 1
    let row = i + 2;
    let rec = rec?;
    out.push(to_problem(rec).map_err(|detail| ImportError::InvalidRow { row, detail })?);
  }
  Ok(out)
}

/// Read a CSV file and insert (or replace) its problems in the catalog.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn import_csv(catalog: &dyn Catalog, path: impl AsRef<Path>) -> Result<usize, ImportError> {
  let file = std::fs::File::open(path.as_ref()).map_err(csv::Error::from)?;
  let problems = parse_problems(file)?;
  let n = catalog.import_problems(&problems).await?;
  info!(target: "leetcoach_backend", imported = n, "Imported problems from CSV");
  Ok(n)
}

fn to_problem(r: CsvRow) -> Result<Problem, String> {
  let title = r.title.trim().to_string();
  if title.is_empty() {
    return Err("empty title".into());
  }
  Ok(Problem {
    id: r.id,
    title,
    description: r.description,
    difficulty: r.difficulty.parse::<Difficulty>()?,
    acceptance_rate: parse_rate(&r.acceptance_rate)?,
    frequency: parse_float(&r.frequency, "frequency")?,
    related_topics: split_topics(&r.related_topics),
    asked_by_faang: parse_bool(&r.asked_by_faang)?,
  })
}

/// "45.2%", "45.2" and "0.452" all mean the same acceptance rate.
fn parse_rate(raw: &str) -> Result<f64, String> {
  let s = raw.trim();
  if s.is_empty() {
    return Ok(0.0);
  }
  let pct = s.ends_with('%');
  let v = parse_float(s.trim_end_matches('%'), "acceptance_rate")?;
  let v = if pct || v > 1.0 { v / 100.0 } else { v };
  if !(0.0..=1.0).contains(&v) {
    return Err(format!("acceptance_rate out of range: {}", raw));
  }
  Ok(v)
}

fn parse_float(raw: &str, field: &str) -> Result<f64, String> {
  let s = raw.trim();
  if s.is_empty() {
    return Ok(0.0);
  }
  s.parse::<f64>().map_err(|e| format!("{}: {} ({})", field, e, raw))
}

fn parse_bool(raw: &str) -> Result<bool, String> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "" | "0" | "false" | "no" | "n" => Ok(false),
    "1" | "true" | "yes" | "y" => Ok(true),
    other => Err(format!("asked_by_faang: not a boolean '{}'", other)),
  }
}

fn split_topics(raw: &str) -> Vec<String> {
  raw.trim_matches(|c| c == '[' || c == ']')
    .split(',')
    .map(|t| t.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_string())
    .filter(|t| !t.is_empty())
    .collect()
}
