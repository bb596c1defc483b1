//! Shape price lookup.
//!
//! Until a live pricing feed is wired in, prices come from a static table
//! whose ordering is strict by size suffix: within a family, `2xlarge`
//! always costs more than `xlarge`, which costs more than `large`. Tests
//! rely on that ordering.

/// Source of current per-shape instance-hour prices.
pub trait ShapePriceSource: Send + Sync {
    /// Current price in USD per instance-hour, None for unknown shapes.
    fn price(&self, shape: &str) -> Option<f64>;
}

/// Multiplier for a size suffix: `large` is 1, `xlarge` 2, `Nxlarge` 2N.
fn size_multiplier(suffix: &str) -> Option<f64> {
    match suffix {
        "large" => Some(1.0),
        "xlarge" => Some(2.0),
        _ => suffix
            .strip_suffix("xlarge")
            .and_then(|n| n.parse::<f64>().ok())
            .map(|n| n * 2.0),
    }
}

/// Base USD per size unit for a family.
fn family_base(family: &str) -> Option<f64> {
    match family {
        "hpc7a" => Some(0.90),
        "hpc6a" => Some(0.72),
        "c6in" => Some(0.11),
        "c5n" => Some(0.10),
        "r6in" => Some(0.17),
        "r5n" => Some(0.15),
        "p4d" => Some(4.10),
        "g5" => Some(0.50),
        "c6i" => Some(0.085),
        "m6i" => Some(0.096),
        "m5" => Some(0.096),
        _ => None,
    }
}

/// The static table.
#[derive(Debug, Clone, Default)]
pub struct MockPriceTable;

impl ShapePriceSource for MockPriceTable {
    fn price(&self, shape: &str) -> Option<f64> {
        let (family, size) = shape.split_once('.')?;
        Some(family_base(family)? * size_multiplier(size)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_is_strictly_ordered_by_size_suffix() {
        let table = MockPriceTable;
        for family in ["c6in", "m6i", "hpc6a"] {
            let large = table.price(&format!("{family}.large")).unwrap();
            let xlarge = table.price(&format!("{family}.xlarge")).unwrap();
            let xlarge2 = table.price(&format!("{family}.2xlarge")).unwrap();
            let xlarge4 = table.price(&format!("{family}.4xlarge")).unwrap();
            assert!(large < xlarge);
            assert!(xlarge < xlarge2);
            assert!(xlarge2 < xlarge4);
        }
    }

    #[test]
    fn test_unknown_shapes_have_no_price() {
        let table = MockPriceTable;
        assert!(table.price("z1d.large").is_none());
        assert!(table.price("c6in").is_none());
        assert!(table.price("c6in.metal").is_none());
    }
}
