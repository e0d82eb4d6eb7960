//! Progress reporting and cooperative cancellation.

use std::ops::ControlFlow;

pub const PERMILL_DONE: u32 = 1000;

/// Receives progress in parts per thousand. Returning `Break` asks the
/// running operation to stop at its next checkpoint.
pub trait Progress {
    fn permill(&mut self, permill: u32, status: Option<&str>) -> ControlFlow<()>;

    fn fraction(&mut self, numerator: u64, denominator: u64) -> ControlFlow<()> {
        self.permill(fraction_to_permill(numerator, denominator), None)
    }
}

impl<F> Progress for F
where
    F: FnMut(u32, Option<&str>) -> ControlFlow<()>,
{
    fn permill(&mut self, permill: u32, status: Option<&str>) -> ControlFlow<()> {
        self(permill, status)
    }
}

/// Discards progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn permill(&mut self, _permill: u32, _status: Option<&str>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Scaled so that very large counts cannot overflow.
pub fn fraction_to_permill(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 || numerator >= denominator {
        return PERMILL_DONE;
    }
    if denominator > 1_000_000 {
        (numerator / (denominator / 1000)).min(u64::from(PERMILL_DONE)) as u32
    } else {
        (numerator * 1000 / denominator) as u32
    }
}

/// Wraps a [`Progress`] so reported values never move backwards.
pub struct Monotonic<'a, P: Progress + ?Sized> {
    inner: &'a mut P,
    last: u32,
}

impl<'a, P: Progress + ?Sized> Monotonic<'a, P> {
    pub fn new(inner: &'a mut P) -> Self {
        Self { inner, last: 0 }
    }

    pub fn last(&self) -> u32 {
        self.last
    }
}

impl<P: Progress + ?Sized> Progress for Monotonic<'_, P> {
    fn permill(&mut self, permill: u32, status: Option<&str>) -> ControlFlow<()> {
        self.last = self.last.max(permill.min(PERMILL_DONE));
        self.inner.permill(self.last, status)
    }
}

/// Comparison count a comparison sort of `n` items is expected to need.
///
/// Empirical estimate only: it exists to move a progress bar and must never
/// drive any decision.
pub fn expected_sort_comparisons(n: usize) -> u64 {
    if n < 2 {
        return 0;
    }
    let n = n as f64;
    (7.5 * n * n.log10()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_scaling() {
        assert_eq!(fraction_to_permill(0, 10), 0);
        assert_eq!(fraction_to_permill(5, 10), 500);
        assert_eq!(fraction_to_permill(10, 10), 1000);
        assert_eq!(fraction_to_permill(3, 0), 1000);
        assert_eq!(fraction_to_permill(1_000_000, 4_000_000), 250);
        assert_eq!(fraction_to_permill(u64::MAX / 2, u64::MAX), 500);
    }

    #[test]
    fn test_monotonic_never_regresses_or_overshoots() {
        let mut seen = Vec::new();
        let mut sink = |p: u32, _: Option<&str>| {
            seen.push(p);
            ControlFlow::Continue(())
        };
        {
            let mut m = Monotonic::new(&mut sink);
            for p in [10, 400, 300, 2000, 900] {
                let _ = m.permill(p, None);
            }
        }
        assert_eq!(seen, vec![10, 400, 400, 1000, 1000]);
    }

    #[test]
    fn test_closure_can_cancel() {
        let mut stop_at_half = |p: u32, _: Option<&str>| {
            if p >= 500 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        assert!(stop_at_half.fraction(1, 4).is_continue());
        assert!(stop_at_half.fraction(3, 4).is_break());
        assert!(NoProgress.permill(1000, Some("done")).is_continue());
    }

    #[test]
    fn test_expected_comparisons() {
        assert_eq!(expected_sort_comparisons(1), 0);
        let e = expected_sort_comparisons(1000);
        assert!((22_499..=22_500).contains(&e));
    }
}
