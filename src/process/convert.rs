use std::collections::HashSet;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::process::date_parser::is_year_label;
use crate::process::reshape::{LongRecord, LongTable, CURRENT_PERIOD};
use crate::process::utils::{strip_thousands, MISSING};

/// A dated fiscal-year observation with a numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRecord {
    pub company: String,
    pub breakdown: String,
    pub year: i64,
    pub values: f64,
}

/// A trailing-period observation; value kept as cleaned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentRecord {
    pub company: String,
    pub breakdown: String,
    pub year: String,
    pub values: String,
}

/// The two disjoint outputs of [`clean`]. Row index is vector position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datasets {
    pub historical: Vec<HistoricalRecord>,
    pub current: Vec<CurrentRecord>,
}

impl Datasets {
    /// Re-emit cleaned rows as long records, historical rows first.
    pub fn to_long(&self) -> LongTable {
        let hist = self.historical.iter().map(|r| LongRecord {
            entity: r.company.clone(),
            metric: r.breakdown.clone(),
            period: r.year.to_string(),
            value: Some(r.values.to_string()),
        });
        let cur = self.current.iter().map(|r| LongRecord {
            entity: r.company.clone(),
            metric: r.breakdown.clone(),
            period: r.year.clone(),
            value: Some(r.values.clone()),
        });
        hist.chain(cur).collect()
    }
}

/// Long record after separator stripping, sentinel filling and renaming.
#[derive(Debug, Clone)]
struct CleanRow {
    company: String,
    breakdown: String,
    year: String,
    values: String,
}

fn dedup(records: &[LongRecord]) -> Vec<&LongRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert((r.entity.as_str(), r.metric.as_str(), r.period.as_str())))
        .collect()
}

fn fill_missing(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => MISSING.to_string(),
    }
}

fn to_historical(row: CleanRow) -> Result<HistoricalRecord> {
    let coercion = |field: &'static str, value: &str| PipelineError::Coercion {
        company: row.company.clone(),
        breakdown: row.breakdown.clone(),
        field,
        value: value.to_string(),
    };

    let year = if is_year_label(&row.year) {
        row.year.parse::<i64>().map_err(|_| coercion("Year", &row.year))?
    } else {
        return Err(coercion("Year", &row.year));
    };
    let values = row
        .values
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| coercion("Values", &row.values))?;

    Ok(HistoricalRecord {
        company: row.company,
        breakdown: row.breakdown,
        year,
        values,
    })
}

/// Clean the concatenated long table into historical and current datasets.
///
/// Values equal to the `-` sentinel (or absent) are dropped, never read
/// as zero. A historical value that still fails to parse is an error.
pub fn clean(long: &LongTable) -> Result<Datasets> {
    let mut rows: Vec<CleanRow> = dedup(&long.records)
        .into_iter()
        .map(|r| CleanRow {
            company: r.entity.clone(),
            breakdown: r.metric.clone(),
            year: r.period.clone(),
            values: fill_missing(r.value.as_deref().map(strip_thousands)),
        })
        .collect();

    rows.sort_by(|a, b| (&a.breakdown, &a.year).cmp(&(&b.breakdown, &b.year)));

    let (current, historical): (Vec<CleanRow>, Vec<CleanRow>) = rows
        .into_iter()
        .filter(|r| r.values != MISSING)
        .partition(|r| r.year == CURRENT_PERIOD);

    let historical = historical
        .into_iter()
        .map(to_historical)
        .collect::<Result<Vec<_>>>()?;
    let current: Vec<CurrentRecord> = current
        .into_iter()
        .map(|r| CurrentRecord {
            company: r.company,
            breakdown: r.breakdown,
            year: r.year,
            values: r.values,
        })
        .collect();

    debug!(
        input = long.len(),
        historical = historical.len(),
        current = current.len(),
        "cleaned long table"
    );
    Ok(Datasets { historical, current })
}
