//! Human readable units for raw counters.

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Binary (1024) steps, two decimals, `PB` as the last unit
pub fn format_bytes(value: f64) -> String {
    let mut val = value;
    for unit in BYTE_UNITS {
        if val < 1024.0 {
            return format!("{:.2} {}", val, unit);
        }
        val /= 1024.0;
    }
    format!("{:.2} PB", val)
}

/// Decimal steps; below one megabit the value is shown as whole bps
pub fn format_speed(bps: f64) -> String {
    if bps >= 1_000_000_000.0 {
        format!("{:.2} Gbps", bps / 1_000_000_000.0)
    } else if bps >= 1_000_000.0 {
        format!("{:.2} Mbps", bps / 1_000_000.0)
    } else {
        format!("{} bps", bps.trunc() as i64)
    }
}
