//! Raw upstream identifiers → canonical macro metric names.

/// Known macro-proxy instruments and the metric names they are stored
/// under. Unlisted identifiers pass through unchanged.
static METRIC_NAMES: &[(&str, &str)] = &[
    ("^TNX", "US_10Y_TREASURY_YIELD"),
    ("DX-Y.NYB", "US_DOLLAR_INDEX"),
    ("GC=F", "GOLD"),
    ("CL=F", "OIL_WTI"),
];

/// Map a raw instrument identifier to its canonical metric name.
///
/// Total and pure: unmapped identifiers come back unchanged, nothing
/// here can fail or touch shared state.
pub fn map_metric(raw: &str) -> &str {
    METRIC_NAMES
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw)
}
