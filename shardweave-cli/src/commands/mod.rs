//! CLI Commands

pub mod bench;
pub mod matrix;
pub mod selftest;

/// Checkmark symbol
#[cfg(windows)]
pub const CHECK: &str = "[OK]";
#[cfg(not(windows))]
pub const CHECK: &str = "\u{2713}";

/// Cross/error symbol
#[cfg(windows)]
pub const CROSS: &str = "[X]";
#[cfg(not(windows))]
pub const CROSS: &str = "\u{2717}";

/// Format a byte rate for display
pub fn format_rate(bytes: u64, seconds: f64) -> String {
    if seconds <= 0.0 {
        return "-".to_string();
    }
    let per_sec = bytes as f64 / seconds;
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if per_sec >= GB {
        format!("{:.2} GB/s", per_sec / GB)
    } else if per_sec >= MB {
        format!("{:.2} MB/s", per_sec / MB)
    } else if per_sec >= KB {
        format!("{:.2} KB/s", per_sec / KB)
    } else {
        format!("{:.0} B/s", per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(512, 1.0), "512 B/s");
        assert_eq!(format_rate(2048, 1.0), "2.00 KB/s");
        assert_eq!(format_rate(3 * 1024 * 1024, 2.0), "1.50 MB/s");
        assert_eq!(format_rate(1, 0.0), "-");
    }
}
