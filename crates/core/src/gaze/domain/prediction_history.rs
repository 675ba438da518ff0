use std::collections::VecDeque;

use super::prediction::PredictionLabel;

pub const DEFAULT_HISTORY_SIZE: usize = 5;

/// Fixed-capacity FIFO of raw per-frame labels with a majority vote.
#[derive(Clone, Debug)]
pub struct PredictionHistory {
    capacity: usize,
    labels: VecDeque<PredictionLabel>,
}

impl PredictionHistory {
    /// A zero capacity is bumped to one so the window can ever fill.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            labels: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, label: PredictionLabel) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.labels.len() == self.capacity
    }

    /// Strict-majority label over a full window; NotForward otherwise.
    pub fn stable(&self) -> PredictionLabel {
        if !self.is_full() {
            return PredictionLabel::NotForward;
        }
        let forward = self.labels.iter().filter(|l| l.is_forward()).count();
        if forward * 2 > self.capacity {
            PredictionLabel::Forward
        } else {
            PredictionLabel::NotForward
        }
    }
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use PredictionLabel::{Forward as F, NotForward as N};

    fn filled(capacity: usize, labels: &[PredictionLabel]) -> PredictionHistory {
        let mut history = PredictionHistory::new(capacity);
        for &l in labels {
            history.push(l);
        }
        history
    }

    #[test]
    fn test_not_full_is_not_forward() {
        let history = filled(5, &[F, F, F, F]);
        assert!(!history.is_full());
        assert_eq!(history.stable(), N);
    }

    #[test]
    fn test_fifth_forward_fills_window() {
        let history = filled(5, &[F, F, F, F, F]);
        assert_eq!(history.stable(), F);
    }

    #[rstest]
    #[case::three_of_five(&[F, N, F, N, F], F)]
    #[case::two_of_five(&[F, N, N, N, F], N)]
    #[case::all_not_forward(&[N, N, N, N, N], N)]
    fn test_majority(#[case] labels: &[PredictionLabel], #[case] expected: PredictionLabel) {
        assert_eq!(filled(5, labels).stable(), expected);
    }

    #[test]
    fn test_even_window_tie_is_not_forward() {
        assert_eq!(filled(4, &[F, F, N, N]).stable(), N);
    }

    #[test]
    fn test_oldest_evicted() {
        let history = filled(3, &[N, N, F, F, F]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.stable(), F);
    }

    #[test]
    fn test_clear_resets_fill() {
        let mut history = filled(5, &[F; 5]);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.stable(), N);
    }

    #[test]
    fn test_zero_capacity_bumped() {
        let history = filled(0, &[F]);
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.stable(), F);
    }
}
