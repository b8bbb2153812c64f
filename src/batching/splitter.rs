// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch splitting for payload-too-large rejections.
//!
//! A rejected batch of `n` actions becomes two contiguous halves of
//! `ceil(n/2)` and `floor(n/2)` actions. The dispatcher recurses on each half
//! until it is accepted or a single action is still too large.

/// Split a batch into two contiguous halves, left half taking the extra item.
///
/// ```
/// use buffered_sender::batching::halve;
///
/// let (left, right) = halve(vec![1, 2, 3, 4, 5]);
/// assert_eq!(left, vec![1, 2, 3]);
/// assert_eq!(right, vec![4, 5]);
/// ```
#[must_use]
pub fn halve<T>(mut batch: Vec<T>) -> (Vec<T>, Vec<T>) {
    let mid = batch.len().div_ceil(2);
    let right = batch.split_off(mid);
    (batch, right)
}

/// Deepest number of sends any single action can see when a batch of `n`
/// keeps being rejected: `ceil(log2 n) + 1`.
#[must_use]
pub fn max_split_depth(n: usize) -> u32 {
    match n {
        0 => 0,
        1 => 1,
        n => usize::BITS - (n - 1).leading_zeros() + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halve_even() {
        let (l, r) = halve(vec!['a', 'b', 'c', 'd']);
        assert_eq!(l, vec!['a', 'b']);
        assert_eq!(r, vec!['c', 'd']);
    }

    #[test]
    fn test_halve_odd_left_heavy() {
        let (l, r) = halve((0..7).collect::<Vec<_>>());
        assert_eq!(l.len(), 4);
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn test_halve_single_and_empty() {
        let (l, r) = halve(vec![1]);
        assert_eq!(l, vec![1]);
        assert!(r.is_empty());

        let (l, r) = halve(Vec::<u8>::new());
        assert!(l.is_empty() && r.is_empty());
    }

    #[test]
    fn test_max_split_depth() {
        assert_eq!(max_split_depth(0), 0);
        assert_eq!(max_split_depth(1), 1);
        assert_eq!(max_split_depth(2), 2);
        assert_eq!(max_split_depth(3), 3);
        assert_eq!(max_split_depth(4), 3);
        assert_eq!(max_split_depth(10), 5);
        assert_eq!(max_split_depth(512), 10);
    }
}
