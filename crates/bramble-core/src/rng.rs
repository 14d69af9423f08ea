//! Uniform random payload generation.
//!
//! Used by the client to synthesize batch-insert payloads and by the local
//! multi-thread demo.

use rand::Rng;

/// Generate `n` uniform floats in `[lo, hi)` with `precision` decimal
/// places.
///
/// Values are sampled as scaled integers so that rounding can never push a
/// sample to `hi` or below `lo`. A range too narrow to hold any value at the
/// requested precision yields `n` copies of `lo`.
pub fn generate(n: usize, lo: f32, hi: f32, precision: u32) -> Vec<f32> {
    let scale = 10f64.powi(precision as i32);
    let lo_scaled = (lo as f64 * scale).ceil() as i64;
    let hi_scaled = (hi as f64 * scale).ceil() as i64;
    if lo_scaled >= hi_scaled {
        return vec![lo; n];
    }

    let mut rng = rand::rng();
    (0..n)
        .map(|_| (rng.random_range(lo_scaled..hi_scaled) as f64 / scale) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_requested_count() {
        assert_eq!(generate(100, 0.0, 10.0, 2).len(), 100);
        assert!(generate(0, 0.0, 10.0, 2).is_empty());
    }

    #[test]
    fn test_values_within_half_open_range() {
        for value in generate(1000, -5.0, 5.0, 4) {
            assert!((-5.0..5.0).contains(&value), "{value} out of range");
        }
    }

    #[test]
    fn test_precision_zero_yields_integers() {
        for value in generate(200, 0.0, 100.0, 0) {
            assert_eq!(value, value.trunc());
        }
    }

    #[test]
    fn test_degenerate_range_yields_lo() {
        assert_eq!(generate(3, 2.5, 2.5, 1), vec![2.5, 2.5, 2.5]);
    }
}
