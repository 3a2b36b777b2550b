//! Compact count formatting for status lines.

/// Format a count with a K/M/B suffix once it passes a thousand.
pub fn format_count(n: u64) -> String {
    const UNITS: [(u64, &str); 3] = [
        (1_000_000_000, "B"),
        (1_000_000, "M"),
        (1_000, "K"),
    ];
    for (scale, suffix) in UNITS {
        if n >= scale {
            return format!("{:.1}{}", n as f64 / scale as f64, suffix);
        }
    }
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_240), "1.2K");
        assert_eq!(format_count(3_400_000), "3.4M");
        assert_eq!(format_count(7_000_000_000), "7.0B");
    }
}
