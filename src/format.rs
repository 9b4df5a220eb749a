//! Formatting utilities for human-readable output.

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with 1024-based units and up to `decimals` fraction digits.
///
/// Trailing zeros are dropped (`1.50 KB` prints as `1.5 KB`). Zero and negative counts print as
/// `0 Bytes`, so a batch that grew in size never shows a negative saving.
pub fn format_bytes(bytes: i64, decimals: usize) -> String {
    if bytes <= 0 {
        return "0 Bytes".to_string();
    }
    let value = bytes as f64;
    let exp = ((value.ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
    let scaled = value / 1024f64.powi(exp as i32);
    let text = format!("{:.*}", decimals, scaled);
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    };
    format!("{} {}", text, UNITS[exp])
}

/// [`format_bytes`] with two decimals.
pub fn format_size(bytes: u64) -> String {
    format_bytes(bytes.min(i64::MAX as u64) as i64, 2)
}
