use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Sent with every outbound API request
pub const USER_AGENT: &str = concat!("attio-clay-sync/", env!("CARGO_PKG_VERSION"));

/// Longest response body kept in an API error
const MAX_BODY_LEN: usize = 500;

/// Turn a non-success response into `PipelineError::Api`, keeping the body for diagnostics
pub async fn ensure_success(service: &'static str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Api {
        service,
        status: status.as_u16(),
        body: truncate_chars(&body, MAX_BODY_LEN),
    })
}

/// Cut `text` to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Format timestamp in human-readable format
pub fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Hide all but the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return "(not set)".to_string();
    }
    if count <= 4 {
        return "*".repeat(count);
    }

    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(8), tail)
}

/// Sleep between outbound calls; a zero delay returns immediately
pub async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (col, width) in columns.iter().zip(widths) {
        row.push_str(&format!("{:<width$}  ", col, width = *width));
    }
    println!("{}", row.trim_end());
}
