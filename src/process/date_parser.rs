use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static US_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("date regex should compile"));

/// Parse a `MM/DD/YYYY` column header and return its year.
pub fn header_year(s: &str) -> Option<i32> {
    let s = s.trim();
    if !US_DATE.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .ok()
        .map(|d| d.year())
}

/// `"03/31/2020"` → `"year_2020"`; anything else is returned unchanged.
pub fn relabel_header(s: &str, prefix: &str) -> String {
    match header_year(s) {
        Some(year) => format!("{}{}", prefix, year),
        None => s.to_string(),
    }
}

/// A period label is historical when it is a 4-digit year.
pub fn is_year_label(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relabels_us_dates() {
        assert_eq!(relabel_header("03/31/2020", "year_"), "year_2020");
        assert_eq!(relabel_header("12/31/2019", "year_"), "year_2019");
        assert_eq!(relabel_header("9/30/2018", "year_"), "year_2018");
    }

    #[test]
    fn leaves_other_headers_alone() {
        assert_eq!(relabel_header("Breakdown", "year_"), "Breakdown");
        assert_eq!(relabel_header("ttm", "year_"), "ttm");
        assert_eq!(relabel_header("2020-03-31", "year_"), "2020-03-31");
        // not a calendar date
        assert_eq!(relabel_header("02/30/2020", "year_"), "02/30/2020");
    }

    #[test]
    fn year_labels() {
        assert!(is_year_label("2019"));
        assert!(!is_year_label("ttm"));
        assert!(!is_year_label("19"));
        assert!(!is_year_label("20190"));
    }
}
