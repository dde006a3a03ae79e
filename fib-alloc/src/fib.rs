//! The Fibonacci size table.
//!
//! Generalizes [`log2`](crate) the way a power-of-two buddy allocator
//! uses a fast `log2` to go from a block size to a free-list order: here
//! every admissible block size is a Fibonacci number, so the table both
//! enumerates the admissible sizes and answers "which index accommodates
//! at least `n` bytes" in a single linear scan over a short table
//! (realistic capacities need on the order of tens of entries).

use thiserror::Error;

/// Errors constructing a [`FibTable`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FibError {
    /// The requested capacity could not hold even `F[0] = 1`.
    #[error("backing capacity of {0} bytes cannot hold a single Fibonacci-sized block")]
    CapacityTooSmall(usize),
}

/// An ascending table of Fibonacci numbers, `F[0] = 1, F[1] = 2, F[i] =
/// F[i-1] + F[i-2]`, truncated to the largest value not exceeding a given
/// capacity.
#[derive(Debug, Clone)]
pub struct FibTable {
    values: Vec<usize>,
}

impl FibTable {
    /// Build the table of all Fibonacci numbers `<= capacity`.
    ///
    /// Fails only if `capacity < 1` (there is no Fibonacci number, not
    /// even `F[0] = 1`, that fits).
    pub fn build(capacity: usize) -> Result<Self, FibError> {
        if capacity < 1 {
            return Err(FibError::CapacityTooSmall(capacity));
        }

        let mut values = vec![1usize];
        if capacity >= 2 {
            values.push(2);
            loop {
                let next = values[values.len() - 1] + values[values.len() - 2];
                if next > capacity {
                    break;
                }
                values.push(next);
            }
        }

        Ok(FibTable { values })
    }

    /// The number of entries in the table.
    #[inline]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// The Fibonacci value at index `i`.
    ///
    /// Panics if `i` is out of range: every caller inside this crate
    /// derives `i` from a block header whose `fib_index` is an internal
    /// invariant, so an out-of-range index means corrupted allocator
    /// state, not caller error.
    #[inline]
    pub fn value(&self, i: usize) -> usize {
        self.values[i]
    }

    /// The smallest index `i` such that `F[i] >= n`, or `None` if `n`
    /// exceeds the table's largest (and therefore the heap's) capacity.
    pub fn smallest_index_at_least(&self, n: usize) -> Option<usize> {
        self.values.iter().position(|&f| f >= n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_and_two() {
        let t = FibTable::build(144).unwrap();
        assert_eq!(t.value(0), 1);
        assert_eq!(t.value(1), 2);
    }

    #[test]
    fn matches_the_worked_example_in_the_spec() {
        // F = [1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, ...]
        let t = FibTable::build(144).unwrap();
        let expected = [1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144];
        let got: Vec<usize> = (0..t.count()).map(|i| t.value(i)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn never_exceeds_capacity() {
        let t = FibTable::build(100).unwrap();
        assert!(t.value(t.count() - 1) <= 100);
        assert!(t.values.iter().all(|&f| f <= 100));
    }

    #[test]
    fn strictly_increasing() {
        let t = FibTable::build(1000).unwrap();
        for w in t.values.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn smallest_index_at_least_is_exact() {
        let t = FibTable::build(144).unwrap();
        assert_eq!(t.smallest_index_at_least(1), Some(0));
        assert_eq!(t.smallest_index_at_least(4), Some(3)); // F[3] = 5
        assert_eq!(t.smallest_index_at_least(144), Some(10));
        assert_eq!(t.smallest_index_at_least(145), None);
    }

    #[test]
    fn capacity_zero_is_rejected() {
        assert_eq!(FibTable::build(0), Err(FibError::CapacityTooSmall(0)));
    }

    #[test]
    fn capacity_one_has_only_f0() {
        let t = FibTable::build(1).unwrap();
        assert_eq!(t.count(), 1);
        assert_eq!(t.value(0), 1);
    }

    quickcheck::quickcheck! {
        fn table_is_always_sorted_and_bounded(capacity: usize) -> quickcheck::TestResult {
            let capacity = (capacity % 4096) + 1;
            let t = match FibTable::build(capacity) {
                Ok(t) => t,
                Err(_) => return quickcheck::TestResult::discard(),
            };
            let sorted = t.values.windows(2).all(|w| w[0] < w[1]);
            let bounded = t.values.iter().all(|&f| f <= capacity);
            quickcheck::TestResult::from_bool(sorted && bounded)
        }
    }
}
