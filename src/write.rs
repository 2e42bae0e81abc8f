// src/write.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

use crate::batch::EntityFailure;
use crate::pipeline::RunOutput;
use crate::process::{CurrentRecord, HistoricalRecord};

pub const HISTORICAL_FILE: &str = "historical.parquet";
pub const CURRENT_FILE: &str = "current.parquet";
pub const REPORT_FILE: &str = "report.json";

/// Summary written next to the datasets.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub entities: usize,
    pub historical_rows: usize,
    pub current_rows: usize,
    pub failures: &'a [EntityFailure],
    pub finished_at: DateTime<Utc>,
}

fn historical_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("Company", DataType::Utf8, false),
        Field::new("Breakdown", DataType::Utf8, false),
        Field::new("Year", DataType::Int64, false),
        Field::new("Values", DataType::Float64, false),
    ]))
}

fn current_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("Company", DataType::Utf8, false),
        Field::new("Breakdown", DataType::Utf8, false),
        Field::new("Year", DataType::Utf8, false),
        Field::new("Values", DataType::Utf8, false),
    ]))
}

fn historical_batch(rows: &[HistoricalRecord]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.company.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.breakdown.as_str()))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.year))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.values))),
    ];
    RecordBatch::try_new(historical_schema(), columns).context("building historical batch")
}

fn current_batch(rows: &[CurrentRecord]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.company.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.breakdown.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.year.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.values.as_str()))),
    ];
    RecordBatch::try_new(current_schema(), columns).context("building current batch")
}

/// Write one batch to `path` via a temp file and rename.
fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let tmp = path.with_extension("parquet.tmp");
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Write both datasets and the run report into `dir`.
pub fn write_output(output: &RunOutput, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let hist_path = dir.join(HISTORICAL_FILE);
    write_parquet(&hist_path, &historical_batch(&output.datasets.historical)?)?;
    let cur_path = dir.join(CURRENT_FILE);
    write_parquet(&cur_path, &current_batch(&output.datasets.current)?)?;

    let report = RunReport {
        entities: output.entity_count,
        historical_rows: output.datasets.historical.len(),
        current_rows: output.datasets.current.len(),
        failures: &output.failures,
        finished_at: Utc::now(),
    };
    let report_path = dir.join(REPORT_FILE);
    let mut f = File::create(&report_path)
        .with_context(|| format!("creating {}", report_path.display()))?;
    serde_json::to_writer_pretty(&mut f, &report).context("serializing run report")?;
    f.write_all(b"\n")?;

    info!(
        dir = %dir.display(),
        historical = report.historical_rows,
        current = report.current_rows,
        "wrote datasets"
    );
    Ok(vec![hist_path, cur_path, report_path])
}
