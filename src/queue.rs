//! Bounded single-producer-single-consumer queue with drop-oldest overflow.
//!
//! One producer thread and one consumer thread are assumed by contract; the
//! internal mutex exists only to hand elements across that thread boundary
//! safely, not to support concurrent producers. A single lock around both
//! ends makes every push/pop atomic with respect to each other, which avoids
//! the torn reads a lock-free ring would need a CAS loop to rule out.

use std::collections::VecDeque;
use std::sync::Mutex;

pub struct SpscQueue<T> {
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
}

impl<T> SpscQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Pushes an element, dropping the oldest one if the queue is full.
    /// Never blocks.
    pub fn push(&self, value: T) {
        let mut q = self.inner.lock().unwrap();
        if q.len() == self.capacity {
            q.pop_front();
        }
        q.push_back(value);
    }

    /// Pops the oldest element, or `None` if empty. Never blocks.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_on_empty_returns_none() {
        let q: SpscQueue<i32> = SpscQueue::new(4);
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn fifo_order_under_capacity() {
        let q = SpscQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    /// 10 pushes into a capacity-4 queue leave the last 4 distinct
    /// indices, in order, with no duplicates.
    #[test]
    fn drop_oldest_keeps_newest_n() {
        let q = SpscQueue::new(4);
        for i in 0..10 {
            q.push(i);
        }
        assert_eq!(q.len(), 4);
        let mut drained = Vec::new();
        while let Some(v) = q.try_pop() {
            drained.push(v);
        }
        assert_eq!(drained, vec![6, 7, 8, 9]);
    }

    #[test]
    fn capacity_never_exceeded() {
        let q = SpscQueue::new(3);
        for i in 0..50 {
            q.push(i);
            assert!(q.len() <= 3);
        }
    }
}
