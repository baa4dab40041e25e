//! Human-readable byte sizes.

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Format a byte count as bytes, KiB, MiB or GiB with two decimals.
pub fn human_size(bytes: i64) -> String {
    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} bytes")
    } else if value < MIB {
        format!("{:.2} KiB", value / KIB)
    } else if value < GIB {
        format!("{:.2} MiB", value / MIB)
    } else {
        format!("{:.2} GiB", value / GIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 bytes");
        assert_eq!(human_size(1023), "1023 bytes");
        assert_eq!(human_size(1024), "1.00 KiB");
        assert_eq!(human_size(1536), "1.50 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 MiB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }
}
