//! Worker pool sizing
//!
//! The pool starts at its minimum size and moves one step at a time: it grows
//! while the backlog exceeds the current size and shrinks back toward the
//! minimum when the frontier runs dry.

/// Tracks the current worker pool size between configured bounds
#[derive(Debug, Clone)]
pub struct PoolSizer {
    min: usize,
    max: usize,
    current: usize,
}

impl PoolSizer {
    /// Creates a sizer starting at `min`
    ///
    /// Bounds are clamped so that `1 <= min <= max`.
    pub fn new(min: usize, max: usize) -> Self {
        let max = max.max(1);
        let min = min.clamp(1, max);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Current number of worker slots
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Adjusts the size for the given number of pending requests
    ///
    /// # Returns
    ///
    /// The new size
    pub fn adjust(&mut self, backlog: usize) -> usize {
        let previous = self.current;

        if backlog > self.current && self.current < self.max {
            self.current += 1;
        } else if backlog == 0 && self.current > self.min {
            self.current -= 1;
        }

        if self.current != previous {
            tracing::debug!(from = previous, to = self.current, backlog, "Resized worker pool");
        }

        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_min() {
        assert_eq!(PoolSizer::new(2, 5).current(), 2);
    }

    #[test]
    fn test_bounds_are_clamped() {
        let sizer = PoolSizer::new(0, 0);
        assert_eq!(sizer.current(), 1);
        assert_eq!(sizer.max(), 1);

        assert_eq!(PoolSizer::new(9, 5).current(), 5);
    }

    #[test]
    fn test_grows_one_step_at_a_time_up_to_max() {
        let mut sizer = PoolSizer::new(2, 5);
        assert_eq!(sizer.adjust(100), 3);
        assert_eq!(sizer.adjust(100), 4);
        assert_eq!(sizer.adjust(100), 5);
        assert_eq!(sizer.adjust(100), 5);
    }

    #[test]
    fn test_holds_when_backlog_matches() {
        let mut sizer = PoolSizer::new(2, 5);
        assert_eq!(sizer.adjust(2), 2);
        assert_eq!(sizer.adjust(1), 2);
    }

    #[test]
    fn test_shrinks_toward_min_when_starved() {
        let mut sizer = PoolSizer::new(2, 5);
        for _ in 0..3 {
            sizer.adjust(100);
        }
        assert_eq!(sizer.adjust(0), 4);
        assert_eq!(sizer.adjust(0), 3);
        assert_eq!(sizer.adjust(0), 2);
        assert_eq!(sizer.adjust(0), 2);
    }
}
