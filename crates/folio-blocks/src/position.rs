//! Fractional positions for sibling ordering.
//!
//! A block's `position` only has to sort correctly against its siblings, so a
//! moved or inserted block can take any value strictly between its new
//! neighbors. One row write per move, no sibling renumbering.
//!
//! Repeated inserts into the same gap halve it each time. At roughly forty
//! halvings of the default step the gap drops below [`MIN_POSITION_GAP`] and
//! [`try_allocate`] reports [`Exhausted`]; callers then respread the whole
//! container with [`spread`].

/// Position given to the first block of an empty container.
pub const POSITION_BASE: f64 = 1000.0;

/// Distance placed before the first / after the last sibling.
pub const POSITION_STEP: f64 = 1000.0;

/// Neighbor gaps narrower than this are treated as exhausted.
pub const MIN_POSITION_GAP: f64 = 1e-9;

/// The gap between two neighbors is too narrow to split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exhausted {
    pub prev: f64,
    pub next: f64,
}

/// Position for a block placed between `prev` and `next`.
///
/// - neither neighbor → [`POSITION_BASE`]
/// - only `next` → `next - POSITION_STEP`
/// - only `prev` → `prev + POSITION_STEP`
/// - both → the midpoint
pub fn allocate(prev: Option<f64>, next: Option<f64>) -> f64 {
    match (prev, next) {
        (None, None) => POSITION_BASE,
        (None, Some(next)) => next - POSITION_STEP,
        (Some(prev), None) => prev + POSITION_STEP,
        (Some(prev), Some(next)) => prev + (next - prev) / 2.0,
    }
}

/// Like [`allocate`], but refuses when the result would not sort strictly
/// between the neighbors.
pub fn try_allocate(prev: Option<f64>, next: Option<f64>) -> Result<f64, Exhausted> {
    if let (Some(p), Some(n)) = (prev, next)
        && (n - p) < MIN_POSITION_GAP
    {
        return Err(Exhausted { prev: p, next: n });
    }

    let candidate = allocate(prev, next);
    if is_between(prev, candidate, next) {
        Ok(candidate)
    } else {
        Err(Exhausted {
            prev: prev.unwrap_or(f64::NEG_INFINITY),
            next: next.unwrap_or(f64::INFINITY),
        })
    }
}

/// Position for a block appended after the current last sibling.
pub fn append_after(last: Option<f64>) -> f64 {
    allocate(last, None)
}

/// Check `prev < candidate < next` against whichever neighbors exist.
pub fn is_between(prev: Option<f64>, candidate: f64, next: Option<f64>) -> bool {
    candidate.is_finite()
        && prev.is_none_or(|p| p < candidate)
        && next.is_none_or(|n| candidate < n)
}

/// Evenly spaced positions for `count` siblings: `STEP, 2·STEP, …`.
pub fn spread(count: usize) -> Vec<f64> {
    (1..=count).map(|i| POSITION_STEP * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_boundaries() {
        assert_eq!(allocate(None, None), 1000.0);
        assert_eq!(allocate(Some(5.0), None), 5.0 + POSITION_STEP);
        assert_eq!(allocate(None, Some(5.0)), 5.0 - POSITION_STEP);
        assert_eq!(allocate(Some(1000.0), Some(2000.0)), 1500.0);
    }

    #[test]
    fn test_append_after() {
        assert_eq!(append_after(None), POSITION_BASE);
        assert_eq!(append_after(Some(2000.0)), 3000.0);
    }

    #[test]
    fn test_midpoint_strictly_between_random() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..10_000 {
            let prev: f64 = rng.gen_range(-1.0e6..1.0e6);
            let gap: f64 = rng.gen_range(1.0e-6..1.0e6);
            let next = prev + gap;
            let v = allocate(Some(prev), Some(next));
            assert!(prev < v && v < next, "{prev} < {v} < {next}");
            assert_eq!(try_allocate(Some(prev), Some(next)), Ok(v));
        }
    }

    #[test]
    fn test_ordering_stress_bisections() {
        // Keep inserting right after the first block until the gap runs out.
        let prev = 1000.0;
        let mut next = 2000.0;
        let mut inserted = 0;
        loop {
            match try_allocate(Some(prev), Some(next)) {
                Ok(v) => {
                    assert!(prev < v && v < next);
                    next = v;
                    inserted += 1;
                }
                Err(exhausted) => {
                    assert_eq!(exhausted.prev, prev);
                    break;
                }
            }
            assert!(inserted < 200, "gap never exhausted");
        }
        assert!(inserted >= 30, "exhausted too early after {inserted}");
    }

    #[test]
    fn test_try_allocate_rejects_collapsed_gap() {
        assert!(try_allocate(Some(1.0), Some(1.0)).is_err());
        assert!(try_allocate(Some(1.0), Some(1.0 + 1e-12)).is_err());
    }

    #[test]
    fn test_is_between_open_ends() {
        assert!(is_between(None, 1.0, None));
        assert!(is_between(Some(0.0), 1.0, None));
        assert!(!is_between(Some(1.0), 1.0, None));
        assert!(!is_between(None, f64::NAN, None));
    }

    #[test]
    fn test_spread() {
        assert_eq!(spread(0), Vec::<f64>::new());
        assert_eq!(spread(3), vec![1000.0, 2000.0, 3000.0]);
    }
}
