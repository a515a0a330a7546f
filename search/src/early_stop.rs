//! Patience-based early stopping on the round-best selection score.

/// Tracks consecutive rounds without a qualifying improvement.
///
/// The first observation sets the baseline. The search engine feeds the best
/// score after each round, so round 1 is the baseline. After that, a round
/// counts as stalled unless it beats the best recorded value by at least
/// `min_improvement`; stopping is signalled once the stall streak exceeds
/// `patience`.
#[derive(Debug, Clone)]
pub struct EarlyStopper {
    patience: usize,
    min_improvement: f64,
    best: Option<f64>,
    stalled: usize,
}

impl EarlyStopper {
    /// Create a stopper.
    #[must_use]
    pub const fn new(patience: usize, min_improvement: f64) -> Self {
        Self {
            patience,
            min_improvement,
            best: None,
            stalled: 0,
        }
    }

    /// Record the best score after a round. Returns `true` when the search should stop.
    pub fn observe(&mut self, round_best: f64) -> bool {
        match self.best {
            None => {
                self.best = Some(round_best);
            }
            Some(best) if round_best - best >= self.min_improvement => {
                self.best = Some(round_best);
                self.stalled = 0;
            }
            Some(_) => {
                self.stalled += 1;
            }
        }
        self.stalled > self.patience
    }

    /// Current stall streak.
    #[must_use]
    pub const fn stalled_rounds(&self) -> usize {
        self.stalled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_gains_stop_at_round_five() {
        let mut stopper = EarlyStopper::new(3, 0.01);
        let sequence = [0.50, 0.505, 0.507, 0.508, 0.508, 0.508];
        let stopped_at = sequence
            .iter()
            .position(|score| stopper.observe(*score))
            .map(|index| index + 1);
        assert_eq!(stopped_at, Some(5));
    }

    #[test]
    fn test_real_improvement_resets_streak() {
        let mut stopper = EarlyStopper::new(2, 0.01);
        assert!(!stopper.observe(0.5));
        assert!(!stopper.observe(0.5));
        assert!(!stopper.observe(0.52));
        assert_eq!(stopper.stalled_rounds(), 0);
        assert!(!stopper.observe(0.52));
        assert!(!stopper.observe(0.52));
        assert!(stopper.observe(0.52));
    }
}
