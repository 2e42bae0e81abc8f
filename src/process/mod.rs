// src/process/mod.rs
//! Markup → raw table → wide table → long table → cleaned datasets.

pub mod convert;
pub mod date_parser;
pub mod raw_table;
pub mod reshape;
pub mod utils;

pub use convert::{clean, CurrentRecord, Datasets, HistoricalRecord};
pub use raw_table::{extract, RawTable};
pub use reshape::{reshape, LongRecord, LongTable, WideTable, CURRENT_PERIOD};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CurrentColumn, StatementPage};
    use anyhow::Result;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,finscraper::process=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    /// One metric, a "current" column and one dated column, end to end.
    #[test]
    fn test_markup_to_datasets() -> Result<()> {
        init_test_logging();
        let page = StatementPage::default();
        let html = r#"
<div class="D(tbr)">
  <div class="D(ib)">Breakdown</div><div class="D(ib)">current</div><div class="D(ib)">03/31/2019</div>
</div>
<div class="D(tbr)">
  <div class="D(tbc)">Revenue</div><div class="D(tbc)">1,000</div><div class="D(tbc)">900</div>
</div>"#;

        let raw = extract(html, &page.selectors, &page.value_prefix)?;
        assert_eq!(raw.headers, vec!["Breakdown", "current", "year_2019"]);

        let wide = WideTable::from_raw("X", &raw, &page.id_column, &page.value_prefix, CurrentColumn::Undated)?;
        let long = reshape(&wide, &page.id_column, &page.value_prefix)?;
        let out = clean(&long)?;

        assert_eq!(
            out.historical,
            vec![HistoricalRecord {
                company: "X".into(),
                breakdown: "Revenue".into(),
                year: 2019,
                values: 900.0,
            }]
        );
        assert_eq!(
            out.current,
            vec![CurrentRecord {
                company: "X".into(),
                breakdown: "Revenue".into(),
                year: CURRENT_PERIOD.into(),
                values: "1000".into(),
            }]
        );
        Ok(())
    }
}
