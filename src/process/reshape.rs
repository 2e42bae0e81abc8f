use std::collections::HashSet;

use crate::config::CurrentColumn;
use crate::error::{PipelineError, Result};
use crate::process::raw_table::RawTable;

/// Period token for the trailing, non-dated column.
pub const CURRENT_PERIOD: &str = "ttm";

/// One (entity, metric, period) observation, value still raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongRecord {
    pub entity: String,
    pub metric: String,
    pub period: String,
    pub value: Option<String>,
}

/// Long records accumulated across entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LongTable {
    pub records: Vec<LongRecord>,
}

impl LongTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Concatenate tables in the given order.
    pub fn concat(parts: impl IntoIterator<Item = LongTable>) -> LongTable {
        parts
            .into_iter()
            .flat_map(|t| t.records)
            .collect()
    }

    /// Pivot back to one wide table per entity, entities and periods in
    /// first-seen order. The inverse of [`reshape`].
    pub fn to_wide(&self, id_column: &str, value_prefix: &str) -> Vec<WideTable> {
        let mut entities: Vec<&str> = Vec::new();
        for r in &self.records {
            if !entities.contains(&r.entity.as_str()) {
                entities.push(&r.entity);
            }
        }

        entities
            .into_iter()
            .map(|entity| {
                let own: Vec<&LongRecord> =
                    self.records.iter().filter(|r| r.entity == entity).collect();

                let mut periods: Vec<&str> = Vec::new();
                let mut metrics: Vec<&str> = Vec::new();
                for r in &own {
                    if !periods.contains(&r.period.as_str()) {
                        periods.push(&r.period);
                    }
                    if !metrics.contains(&r.metric.as_str()) {
                        metrics.push(&r.metric);
                    }
                }

                let headers: Vec<String> = std::iter::once(id_column.to_string())
                    .chain(periods.iter().map(|p| format!("{}{}", value_prefix, p)))
                    .collect();

                let rows: Vec<Vec<Option<String>>> = metrics
                    .iter()
                    .map(|m| {
                        std::iter::once(Some(m.to_string()))
                            .chain(periods.iter().map(|p| {
                                own.iter()
                                    .find(|r| r.metric == *m && r.period == *p)
                                    .and_then(|r| r.value.clone())
                            }))
                            .collect()
                    })
                    .collect();

                WideTable {
                    entity: entity.to_string(),
                    headers,
                    rows,
                }
            })
            .collect()
    }
}

impl FromIterator<LongRecord> for LongTable {
    fn from_iter<I: IntoIterator<Item = LongRecord>>(iter: I) -> Self {
        LongTable {
            records: iter.into_iter().collect(),
        }
    }
}

/// A single entity's statement: one row per metric, one column per period.
///
/// Rows are padded to the header width; absent cells are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideTable {
    pub entity: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl WideTable {
    /// Validate an extracted table and mark its current-period column.
    pub fn from_raw(
        entity: &str,
        raw: &RawTable,
        id_column: &str,
        value_prefix: &str,
        current: CurrentColumn,
    ) -> Result<WideTable> {
        let shape = |msg: String| PipelineError::ExtractionShape(format!("{}: {}", entity, msg));

        let id_idx = raw
            .column_index(id_column)
            .ok_or_else(|| shape(format!("no `{}` column in {:?}", id_column, raw.headers)))?;
        if raw.rows.is_empty() {
            return Err(shape("table has a header but no rows".into()));
        }

        let width = raw.headers.len();
        if let Some(row) = raw.rows.iter().find(|r| r.len() > width) {
            return Err(shape(format!(
                "row has {} cells but only {} headers",
                row.len(),
                width
            )));
        }

        let current_idx = locate_current(&raw.headers, id_idx, value_prefix, current)
            .map_err(shape)?;

        let headers: Vec<String> = raw
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if Some(i) == current_idx {
                    format!("{}{}", value_prefix, CURRENT_PERIOD)
                } else {
                    h.clone()
                }
            })
            .collect();

        let mut seen = HashSet::new();
        let rows = raw
            .rows
            .iter()
            .map(|r| {
                let metric = r
                    .get(id_idx)
                    .ok_or_else(|| shape(format!("row without `{}` value", id_column)))?;
                if !seen.insert(metric.as_str()) {
                    return Err(shape(format!("metric `{}` appears twice", metric)));
                }
                Ok((0..width).map(|i| r.get(i).cloned()).collect())
            })
            .collect::<Result<Vec<Vec<Option<String>>>>>()?;

        Ok(WideTable {
            entity: entity.to_string(),
            headers,
            rows,
        })
    }
}

fn locate_current(
    headers: &[String],
    id_idx: usize,
    value_prefix: &str,
    current: CurrentColumn,
) -> std::result::Result<Option<usize>, String> {
    match current {
        CurrentColumn::Position(n) => {
            if n >= headers.len() || n == id_idx {
                Err(format!(
                    "current column position {} is not a period column of {:?}",
                    n, headers
                ))
            } else {
                Ok(Some(n))
            }
        }
        CurrentColumn::Undated => {
            let undated: Vec<usize> = headers
                .iter()
                .enumerate()
                .filter(|(i, h)| *i != id_idx && !h.starts_with(value_prefix))
                .map(|(i, _)| i)
                .collect();
            match undated.as_slice() {
                [] => Ok(None),
                [only] => Ok(Some(*only)),
                _ => Err(format!(
                    "ambiguous current column, undated headers {:?}",
                    undated.iter().map(|&i| &headers[i]).collect::<Vec<_>>()
                )),
            }
        }
    }
}

/// Wide → long pivot.
///
/// Every column named `<value_prefix><period>` yields one record per row,
/// rows kept grouped by `id_column`. Other columns are not carried.
/// Cells past the end of a short row are absent.
pub fn reshape(wide: &WideTable, id_column: &str, value_prefix: &str) -> Result<LongTable> {
    let id_idx = wide
        .headers
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| {
            PipelineError::ExtractionShape(format!("{}: no `{}` column", wide.entity, id_column))
        })?;

    let periods: Vec<(usize, &str)> = wide
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != id_idx)
        .filter_map(|(i, h)| h.strip_prefix(value_prefix).map(|p| (i, p)))
        .collect();

    Ok(wide
        .rows
        .iter()
        .flat_map(|row| {
            let metric = row.get(id_idx).cloned().flatten().unwrap_or_default();
            periods.iter().map(move |&(i, period)| LongRecord {
                entity: wide.entity.clone(),
                metric: metric.clone(),
                period: period.to_string(),
                value: row.get(i).cloned().flatten(),
            })
        })
        .collect())
}
