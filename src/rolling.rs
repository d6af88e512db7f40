//! Bounded history for noisy input channels.

use std::collections::VecDeque;

/// A fixed-capacity FIFO of the most recent samples.
///
/// Pushing past capacity evicts the oldest sample. The window only keeps
/// history; averaging and other smoothing is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingWindow<T> {
    capacity: usize,
    values: VecDeque<T>,
}

impl<T> RollingWindow<T> {
    /// Create an empty window holding at most `capacity` values.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> RollingWindow<T> {
        let capacity = capacity.max(1);
        RollingWindow {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Values in insertion order, oldest first.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.values.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.values.back()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.values.front()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, dropping the oldest values if the window shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<T: Clone> RollingWindow<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }
}

impl<T: Copy + Into<f64>> RollingWindow<T> {
    /// Arithmetic mean of the current contents, `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().map(|&v| v.into()).sum();
        Some(sum / self.values.len() as f64)
    }
}

impl<T> Extend<T> for RollingWindow<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let mut window = RollingWindow::new(3);
        window.extend([1, 2, 3, 4]);
        assert_eq!(window.to_vec(), vec![2, 3, 4]);
        assert_eq!(window.oldest(), Some(&2));
        assert_eq!(window.latest(), Some(&4));
    }

    #[test]
    fn capacity_one_keeps_latest_only() {
        let mut window = RollingWindow::new(1);
        window.push(10i16);
        window.push(-5);
        assert_eq!(window.len(), 1);
        assert_eq!(window.latest(), Some(&-5));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut window = RollingWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push('a');
        window.push('b');
        assert_eq!(window.to_vec(), vec!['b']);
    }

    #[test]
    fn shrinking_drops_from_front() {
        let mut window = RollingWindow::new(5);
        window.extend(1..=5);
        window.set_capacity(2);
        assert_eq!(window.to_vec(), vec![4, 5]);
        window.push(6);
        assert_eq!(window.to_vec(), vec![5, 6]);
    }

    #[test]
    fn mean_of_samples() {
        let mut window: RollingWindow<i16> = RollingWindow::new(4);
        assert_eq!(window.mean(), None);
        window.extend([2, 4, 6, 8, 10]);
        assert_eq!(window.mean(), Some(7.0));
    }

    #[test]
    fn values_iterate_oldest_first() {
        let mut window = RollingWindow::new(3);
        window.extend([7, 8]);
        let collected: Vec<_> = window.values().copied().collect();
        assert_eq!(collected, vec![7, 8]);
        assert_eq!(window.values().rev().next(), Some(&8));
        window.clear();
        assert!(window.is_empty());
    }
}
