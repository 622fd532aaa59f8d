//! Round-robin-with-skip target selection.

use std::collections::HashSet;

use crate::health::target::Target;

/// Healthy-target selector.
/// Holds no state of its own; the caller owns the rotating cursor.
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetSelector;

impl TargetSelector {
    /// Index of the first untainted target at or after `cursor` (mod len),
    /// skipping indices in `excluded`. `None` when nothing is eligible.
    pub fn select(targets: &[Target], cursor: usize, excluded: &HashSet<usize>) -> Option<usize> {
        if targets.is_empty() {
            return None;
        }

        // Simple loop bound to avoid spinning when everything is tainted
        let len = targets.len();
        for i in 0..len {
            let index = cursor.wrapping_add(i) % len;
            if excluded.contains(&index) {
                continue;
            }
            if !targets[index].is_tainted() {
                return Some(index);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;

    fn targets(n: usize) -> Vec<Target> {
        (0..n)
            .map(|i| {
                Target::new(
                    i,
                    TargetConfig::http(format!("t{i}"), format!("http://127.0.0.1:{}", 9000 + i)),
                    4,
                )
            })
            .collect()
    }

    #[test]
    fn rotates_with_cursor() {
        let t = targets(3);
        let none = HashSet::new();
        assert_eq!(TargetSelector::select(&t, 0, &none), Some(0));
        assert_eq!(TargetSelector::select(&t, 1, &none), Some(1));
        assert_eq!(TargetSelector::select(&t, 2, &none), Some(2));
        assert_eq!(TargetSelector::select(&t, 3, &none), Some(0));
    }

    #[test]
    fn skips_tainted() {
        let t = targets(3);
        t[1].taint();
        let none = HashSet::new();
        assert_eq!(TargetSelector::select(&t, 1, &none), Some(2));
        t[2].taint();
        assert_eq!(TargetSelector::select(&t, 1, &none), Some(0));
        t[0].taint();
        assert_eq!(TargetSelector::select(&t, 1, &none), None);
    }

    #[test]
    fn never_returns_excluded_even_if_healthy() {
        let t = targets(3);
        let excluded: HashSet<usize> = [0, 2].into_iter().collect();
        for cursor in 0..10 {
            assert_eq!(TargetSelector::select(&t, cursor, &excluded), Some(1));
        }
        let all: HashSet<usize> = [0, 1, 2].into_iter().collect();
        assert_eq!(TargetSelector::select(&t, 0, &all), None);
    }

    #[test]
    fn cursor_wraps_at_usize_max() {
        let t = targets(2);
        let picked = TargetSelector::select(&t, usize::MAX, &HashSet::new());
        assert!(picked.is_some());
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert_eq!(TargetSelector::select(&[], 0, &HashSet::new()), None);
    }
}
