//! Alert text cleanup.
//!
//! Alert bodies arrive with every language concatenated into one blob,
//! separated by a literal marker line. Only the first (English) segment is
//! kept for display.

/// Literal separator between language segments in alert text.
pub const TRANSLATION_SEPARATOR: &str = "-----";

/// Keeps the first language segment, strips trailing whitespace from every
/// line, and collapses runs of three or more newlines down to two.
pub fn clean_alert_text(raw: &str) -> String {
    let first_segment = raw.split(TRANSLATION_SEPARATOR).next().unwrap_or("");

    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;
    for line in first_segment.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run >= 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}
