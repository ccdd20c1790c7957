//! Memory budget parsing.

use segpool_core::PoolError;

/// Parse a memory limit string (e.g., "8G", "512M", "1024K", "4096").
///
/// An empty string or zero means unlimited and yields `None`.
pub fn parse_memory_limit(s: &str) -> Result<Option<usize>, PoolError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }

    let upper = s.to_ascii_uppercase();
    let (num_str, multiplier) = if let Some(n) = upper.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix('K') {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let value: usize = num_str
        .trim()
        .parse()
        .map_err(|e| PoolError::Config(format!("invalid memory limit '{s}': {e}")))?;
    let bytes = value
        .checked_mul(multiplier)
        .ok_or_else(|| PoolError::Config(format!("memory limit '{s}' overflows")))?;
    Ok((bytes > 0).then_some(bytes))
}
