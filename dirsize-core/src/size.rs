/// Unit base for human-readable sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    /// Powers of 1024 (KiB, MiB, ...)
    #[default]
    Binary,
    /// Powers of 1000 (kB, MB, ...), as used by `du --si`
    Decimal,
}

impl Units {
    fn base(self) -> f64 {
        match self {
            Units::Binary => 1024.0,
            Units::Decimal => 1000.0,
        }
    }

    fn suffixes(self) -> &'static [&'static str] {
        match self {
            Units::Binary => &["KiB", "MiB", "GiB", "TiB", "PiB"],
            Units::Decimal => &["kB", "MB", "GB", "TB", "PB"],
        }
    }
}

/// Format bytes into human-readable string using binary units
pub fn format_size(bytes: u64) -> String {
    format_size_with(bytes, Units::Binary)
}

pub fn format_size_with(bytes: u64, units: Units) -> String {
    let base = units.base();
    if (bytes as f64) < base {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut suffix = "B";
    for s in units.suffixes() {
        if value < base {
            break;
        }
        value /= base;
        suffix = s;
    }
    format!("{:.1} {}", value, suffix)
}

/// Format a number with thousand separators (e.g., 1,234,567)
pub fn format_count(n: u64) -> String {
    if n < 1000 {
        return n.to_string();
    }

    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);

    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.0 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(1024 * 1024), "1.0 MiB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GiB");
        assert_eq!(format_size(1024 * 1024 * 1024 * 1024), "1.0 TiB");
    }

    #[test]
    fn test_format_size_decimal() {
        assert_eq!(format_size_with(999, Units::Decimal), "999 B");
        assert_eq!(format_size_with(1000, Units::Decimal), "1.0 kB");
        assert_eq!(format_size_with(1_500_000, Units::Decimal), "1.5 MB");
        assert_eq!(format_size_with(60, Units::Decimal), "60 B");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(12345), "12,345");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
