use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::TableSelectors;
use crate::error::{PipelineError, Result};
use crate::process::{date_parser, utils::clean_str};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Header cell text of the first matched row, date headers relabeled.
    pub headers: Vec<String>,
    /// Cell text of every matched row after the first.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Values of one column, in row order. Short rows are skipped.
    pub fn column(&self, idx: usize) -> Vec<String> {
        self.rows.iter().filter_map(|r| r.get(idx).cloned()).collect()
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| PipelineError::Selector {
        selector: s.to_string(),
        reason: format!("{:?}", e),
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    clean_str(&el.text().collect::<String>())
}

/// Parse `markup` into a header row and data rows.
///
/// The first element matching `selectors.row` supplies the headers (via
/// `selectors.header`) and is not itself returned as data. Headers that
/// read as `MM/DD/YYYY` become `<date_prefix><YYYY>`.
pub fn extract(markup: &str, selectors: &TableSelectors, date_prefix: &str) -> Result<RawTable> {
    let row_sel = parse_selector(&selectors.row)?;
    let header_sel = parse_selector(&selectors.header)?;
    let cell_sel = parse_selector(&selectors.cell)?;

    let document = Html::parse_document(markup);
    let mut matched = document.select(&row_sel);

    let first = matched.next().ok_or_else(|| {
        PipelineError::ExtractionShape(format!("no element matches row selector `{}`", selectors.row))
    })?;

    let headers: Vec<String> = first
        .select(&header_sel)
        .map(text_of)
        .map(|h| date_parser::relabel_header(&h, date_prefix))
        .collect();

    let rows: Vec<Vec<String>> = matched
        .map(|row| row.select(&cell_sel).map(text_of).collect())
        .collect();

    debug!(headers = headers.len(), rows = rows.len(), "extracted table");
    Ok(RawTable { headers, rows })
}
