//! Bounded FIFO of samples.

use std::collections::VecDeque;

/// Fixed-capacity window; pushing when full evicts the oldest sample.
#[derive(Clone, Debug)]
pub struct SampleWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy> SampleWindow<T> {
    /// Creates an empty window. Capacity is at least one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample.
    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Removes samples from the front while `pred` holds.
    pub fn evict_while(&mut self, mut pred: impl FnMut(&T) -> bool) {
        while self.samples.front().is_some_and(&mut pred) {
            self.samples.pop_front();
        }
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Newest sample.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.samples.back().copied()
    }

    /// Samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    /// Copies the samples out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().copied().collect()
    }

    /// Empties the window.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut window = SampleWindow::new(3);
        for i in 0..5 {
            window.push(i);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.to_vec(), vec![2, 3, 4]);
        assert_eq!(window.last(), Some(4));
    }

    #[test]
    fn test_evict_while() {
        let mut window = SampleWindow::new(10);
        for t in [100_u64, 200, 900, 1_500] {
            window.push(t);
        }
        window.evict_while(|&t| t + 1_000 <= 1_500);
        assert_eq!(window.to_vec(), vec![900, 1_500]);
    }
}
