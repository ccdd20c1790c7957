//! Version information.

/// Get the version string.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get the full version string, including the pointer width the pool's
/// link layout depends on.
#[must_use]
pub fn full_version() -> String {
    format!(
        "segpool {} ({}-bit links)",
        version(),
        usize::BITS
    )
}
