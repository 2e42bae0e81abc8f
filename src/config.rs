// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::error::PipelineError;

/// Placeholder substituted with each constituent's symbol.
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

static DEFAULT_INDEX_URL: &str = "https://finance.yahoo.com/quote/%5EDJI/components";
static DEFAULT_ENTITY_URL_TEMPLATE: &str = "https://finance.yahoo.com/quote/{symbol}/financials";

/// What to do when one entity's pipeline fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failure (input order).
    FailFast,
    /// Log the failure, keep going, report it at the end.
    #[default]
    SkipAndLog,
}

/// How the trailing ("ttm") column of a statement table is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CurrentColumn {
    /// The one period column whose header is not a date.
    #[default]
    Undated,
    /// A fixed header index, counted from 0 including the id column.
    Position(usize),
}

/// CSS selectors and column names for one kind of table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSelectors {
    pub row: String,
    pub header: String,
    pub cell: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexPage {
    pub selectors: TableSelectors,
    /// Column holding the constituent symbols; first column when unset.
    pub symbol_column: Option<String>,
    /// Element that must exist before the page counts as loaded.
    pub marker: Option<String>,
}

impl Default for IndexPage {
    fn default() -> Self {
        Self {
            selectors: TableSelectors {
                row: "tr".into(),
                header: "th".into(),
                cell: "td".into(),
            },
            symbol_column: None,
            marker: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementPage {
    pub selectors: TableSelectors,
    pub id_column: String,
    pub value_prefix: String,
    pub current_column: CurrentColumn,
    pub marker: Option<String>,
}

impl Default for StatementPage {
    fn default() -> Self {
        Self {
            selectors: TableSelectors {
                row: r"div.D\(tbr\)".into(),
                header: r"div.D\(ib\)".into(),
                cell: r"div.D\(tbc\)".into(),
            },
            id_column: "Breakdown".into(),
            value_prefix: "year_".into(),
            current_column: CurrentColumn::Undated,
            marker: Some("#header-logo".into()),
        }
    }
}

/// Run configuration, read from YAML. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_url: String,
    pub entity_url_template: String,
    pub worker_count: usize,
    pub batch_size: usize,
    pub retry_interval_secs: u64,
    /// `None` retries a missing page marker until a fatal error.
    pub max_retries: Option<u32>,
    pub failure_policy: FailurePolicy,
    pub user_agent: Option<String>,
    pub request_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub index: IndexPage,
    pub statement: StatementPage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.into(),
            entity_url_template: DEFAULT_ENTITY_URL_TEMPLATE.into(),
            worker_count: default_worker_count(),
            batch_size: 5,
            retry_interval_secs: 30,
            max_retries: None,
            failure_policy: FailurePolicy::default(),
            user_agent: None,
            request_timeout_secs: 60,
            output_dir: PathBuf::from("output"),
            index: IndexPage::default(),
            statement: StatementPage::default(),
        }
    }
}

/// One core is left free for the coordinating thread.
fn default_worker_count() -> usize {
    rayon::current_num_threads().saturating_sub(1).max(1)
}

impl Config {
    /// Load and validate a YAML config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.worker_count == 0 {
            return Err(PipelineError::Config("worker_count must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be at least 1".into()));
        }
        if !self.entity_url_template.contains(SYMBOL_PLACEHOLDER) {
            return Err(PipelineError::Config(format!(
                "entity_url_template `{}` has no {} placeholder",
                self.entity_url_template, SYMBOL_PLACEHOLDER
            )));
        }
        if self.statement.value_prefix.is_empty() {
            return Err(PipelineError::Config("statement.value_prefix is empty".into()));
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn entity_url(&self, symbol: &str) -> String {
        self.entity_url_template.replace(SYMBOL_PLACEHOLDER, symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.worker_count >= 1);
        assert_eq!(cfg.statement.id_column, "Breakdown");
        assert_eq!(
            cfg.entity_url("AAPL"),
            "https://finance.yahoo.com/quote/AAPL/financials"
        );
    }

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(
            tmp,
            "worker_count: 3\nbatch_size: 2\nmax_retries: 4\nfailure_policy: fail_fast\nstatement:\n  current_column: !position 1"
        )?;

        let cfg = Config::from_path(tmp.path())?;
        assert_eq!(cfg.worker_count, 3);
        assert_eq!(cfg.batch_size, 2);
        assert_eq!(cfg.max_retries, Some(4));
        assert_eq!(cfg.failure_policy, FailurePolicy::FailFast);
        assert_eq!(cfg.statement.current_column, CurrentColumn::Position(1));
        assert_eq!(cfg.statement.value_prefix, "year_");
        assert_eq!(cfg.retry_interval_secs, 30);
        Ok(())
    }

    #[test]
    fn rejects_zero_batch_size() {
        let cfg = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let cfg = Config {
            entity_url_template: "https://example.com/financials".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
