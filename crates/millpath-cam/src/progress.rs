//! Progress reporting and cooperative cancellation.
//!
//! Generators report through a caller-supplied `FnMut(&ProgressEvent) -> Control`
//! callback, always invoked on the calling thread. Returning
//! [`Control::Cancel`] stops the run at the next check; the moves finished so
//! far are still returned.

use millpath_math::Point3;

/// Something worth telling the caller about.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Status text, e.g. the line being processed.
    Text(String),
    /// Overall completion in percent, `0.0..=100.0`.
    Percent(f64),
    /// Latest tool position (`None` for a safety move).
    Position(Option<Point3>),
}

/// Decision returned by a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    /// Keep going.
    #[default]
    Continue,
    /// Stop as soon as possible.
    Cancel,
}

impl Control {
    /// `true` for [`Control::Cancel`].
    pub fn is_cancel(self) -> bool {
        self == Control::Cancel
    }
}

impl From<bool> for Control {
    /// `true` means cancel.
    fn from(cancel: bool) -> Self {
        if cancel {
            Control::Cancel
        } else {
            Control::Continue
        }
    }
}

/// Counts finished work items and reports them as a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressCounter {
    max: usize,
    current: usize,
}

impl ProgressCounter {
    /// Counter for `max` items. A `max` of zero counts towards 100 instead.
    pub fn new(max: usize) -> Self {
        Self {
            max: if max == 0 { 100 } else { max },
            current: 0,
        }
    }

    /// Items finished so far.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Completion percentage, clamped to `0.0..=100.0`.
    pub fn percent(&self) -> f64 {
        (100.0 * self.current as f64 / self.max as f64).clamp(0.0, 100.0)
    }

    /// Count one finished item and report the new percentage.
    pub fn increment<F>(&mut self, callback: &mut F) -> Control
    where
        F: FnMut(&ProgressEvent) -> Control,
    {
        self.current += 1;
        self.update(callback)
    }

    /// Report the current percentage without counting.
    pub fn update<F>(&self, callback: &mut F) -> Control
    where
        F: FnMut(&ProgressEvent) -> Control,
    {
        callback(&ProgressEvent::Percent(self.percent()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let mut seen = Vec::new();
        let mut cb = |e: &ProgressEvent| {
            if let ProgressEvent::Percent(p) = e {
                seen.push(*p);
            }
            Control::Continue
        };
        let mut counter = ProgressCounter::new(4);
        for _ in 0..5 {
            assert_eq!(counter.increment(&mut cb), Control::Continue);
        }
        assert_eq!(seen, vec![25.0, 50.0, 75.0, 100.0, 100.0]);
        assert_eq!(counter.current(), 5);
    }

    #[test]
    fn test_zero_max() {
        let mut counter = ProgressCounter::new(0);
        let mut cb = |_: &ProgressEvent| Control::Continue;
        counter.increment(&mut cb);
        assert_eq!(counter.percent(), 1.0);
    }

    #[test]
    fn test_cancel_is_forwarded() {
        let mut counter = ProgressCounter::new(10);
        let mut calls = 0;
        let mut cb = |_: &ProgressEvent| {
            calls += 1;
            Control::from(calls >= 2)
        };
        assert!(!counter.increment(&mut cb).is_cancel());
        assert!(counter.increment(&mut cb).is_cancel());
    }
}
