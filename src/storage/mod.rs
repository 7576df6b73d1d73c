//! Storage primitives for the socket layer.
//!
//! The only structure needed here is a strict first-in first-out queue with owned nodes. The
//! datagram ordering guarantee of the socket layer rests entirely on this queue never reordering
//! its elements.
use alloc::collections::VecDeque;

/// A strict first-in first-out queue.
///
/// A thin wrapper around a growable ring buffer that only exposes the operations the receive and
/// transmit engines are allowed to perform: append at the tail, inspect or remove at the head.
#[derive(Debug)]
pub struct Fifo<T> {
    queue: VecDeque<T>,
}

impl<T> Fifo<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Fifo { queue: VecDeque::new() }
    }

    /// Append an element at the tail.
    pub fn push(&mut self, element: T) {
        self.queue.push_back(element);
    }

    /// Remove and return the element at the head.
    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    /// Return a reference to the element at the head without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.queue.front()
    }

    /// Query whether the queue holds no elements.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The number of queued elements.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Fifo::new()
    }
}
