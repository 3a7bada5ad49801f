//! Label column encoding
//!
//! Labels are stored as one string: every label followed by a comma,
//! including the last one (`"tabby,tiger_cat,Egyptian_cat,"`). Existing rows
//! use this layout, so the trailing comma is kept.

/// Join labels into the stored column value
pub fn format_labels<S: AsRef<str>>(labels: &[S]) -> String {
    let mut value = String::new();
    for label in labels {
        value.push_str(label.as_ref());
        value.push(',');
    }
    value
}

/// Split a stored column value back into labels
///
/// The empty segment produced by the trailing comma is dropped.
pub fn parse_labels(value: &str) -> Vec<String> {
    let mut labels: Vec<String> = value.split(',').map(str::to_string).collect();
    if labels.last().is_some_and(|l| l.is_empty()) {
        labels.pop();
    }
    labels
}
