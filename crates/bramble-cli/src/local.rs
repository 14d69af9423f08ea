//! Local multi-thread counting demo — no master, no tree.
//!
//! Generates a random array, splits it across OS threads each counting
//! occurrences of one value, then verifies the result against a sequential
//! scan. Exists purely for comparison against the distributed path.

use anyhow::{anyhow, Result};

use bramble_core::rng;

/// Run the demo end to end and report both counts.
pub fn run(
    threads: usize,
    element: f32,
    count: usize,
    lo: f32,
    hi: f32,
    precision: u32,
) -> Result<()> {
    let values = rng::generate(count, lo, hi, precision);
    if values.len() <= 20 {
        println!("{values:?}");
    }

    let counted = parallel_count(&values, element, threads)?;
    let expected = values.iter().filter(|v| **v == element).count();

    println!("element {element} present {counted} time(s) ({expected} expected)");
    if counted == expected {
        println!("=> ok: thread result matches the sequential scan");
    } else {
        println!("=> MISMATCH: thread result differs from the sequential scan");
    }
    Ok(())
}

/// Count occurrences of `element` across `threads` scoped worker threads.
pub fn parallel_count(values: &[f32], element: f32, threads: usize) -> Result<usize> {
    let chunk_len = values.len().div_ceil(threads).max(1);
    std::thread::scope(|scope| {
        let handles: Vec<_> = values
            .chunks(chunk_len)
            .map(|chunk| scope.spawn(move || chunk.iter().filter(|v| **v == element).count()))
            .collect();
        handles.into_iter().try_fold(0usize, |acc, handle| {
            handle
                .join()
                .map(|found| acc + found)
                .map_err(|_| anyhow!("counting thread panicked"))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parallel_count_matches_sequential() {
        let values = [1.0, 2.0, 1.0, 3.0, 1.0, 4.0, 1.0, 5.0];
        for threads in 1..=8 {
            assert_eq!(parallel_count(&values, 1.0, threads).unwrap(), 4);
        }
    }

    #[test]
    fn test_parallel_count_absent_element() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(parallel_count(&values, 9.0, 2).unwrap(), 0);
    }

    #[test]
    fn test_parallel_count_empty_array() {
        assert_eq!(parallel_count(&[], 1.0, 4).unwrap(), 0);
    }

    #[test]
    fn test_more_threads_than_values() {
        let values = [7.0, 7.0];
        assert_eq!(parallel_count(&values, 7.0, 16).unwrap(), 2);
    }
}
