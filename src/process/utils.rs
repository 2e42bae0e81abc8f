/// Token standing in for a value known to be absent.
pub const MISSING: &str = "-";

/// Trim whitespace, collapsing internal runs the way rendered text reads.
pub fn clean_str(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop thousands separators; every other character is kept.
pub fn strip_thousands(raw: &str) -> String {
    raw.replace(',', "")
}
