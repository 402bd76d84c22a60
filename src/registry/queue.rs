//! Bounded broadcast queue
//!
//! Sits between a stream's producer and its broadcaster. The producer must
//! keep up with the live upstream feed, so `push` never waits: when the
//! queue is full the oldest chunk is evicted to make room.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

struct QueueState {
    chunks: VecDeque<Bytes>,
    closed: bool,
}

/// Fixed-capacity FIFO of byte chunks with drop-oldest overflow
///
/// One writer (the producer) and one reader (the broadcaster).
pub struct BroadcastQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl BroadcastQueue {
    /// Create a queue holding at most `capacity` chunks (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                chunks: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a chunk, evicting the oldest one if full
    ///
    /// Returns false if the queue is closed.
    pub fn push(&self, chunk: Bytes) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            if state.chunks.len() >= self.capacity {
                state.chunks.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            state.chunks.push_back(chunk);
        }
        self.notify.notify_one();
        true
    }

    /// Next chunk in FIFO order
    ///
    /// Waits while the queue is empty. Once closed, the remaining chunks
    /// are still handed out, then `None`.
    pub async fn pop(&self) -> Option<Bytes> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(chunk) = state.chunks.pop_front() {
                    return Some(chunk);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Stop accepting chunks and wake the reader
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Chunks evicted by overflow so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for BroadcastQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn chunk(n: u8) -> Bytes {
        Bytes::from(vec![n])
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = BroadcastQueue::new(4);
        for n in 0..3 {
            assert!(queue.push(chunk(n)));
        }

        assert_eq!(queue.pop().await.unwrap(), chunk(0));
        assert_eq!(queue.pop().await.unwrap(), chunk(1));
        assert_eq!(queue.pop().await.unwrap(), chunk(2));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let queue = BroadcastQueue::new(3);

        // Nobody reads, push must still return immediately
        for n in 0..10 {
            assert!(queue.push(chunk(n)));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 7);
        assert_eq!(queue.pop().await.unwrap(), chunk(7));
        assert_eq!(queue.pop().await.unwrap(), chunk(8));
        assert_eq!(queue.pop().await.unwrap(), chunk(9));
    }

    #[tokio::test]
    async fn test_each_overflow_evicts_exactly_one() {
        let queue = BroadcastQueue::new(2);
        queue.push(chunk(1));
        queue.push(chunk(2));

        queue.push(chunk(3));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().await.unwrap(), chunk(2));
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(BroadcastQueue::new(4));

        let reader = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(chunk(42));

        assert_eq!(reader.await.unwrap(), Some(chunk(42)));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = BroadcastQueue::new(4);
        queue.push(chunk(1));
        queue.close();

        assert!(!queue.push(chunk(2)));
        assert_eq!(queue.pop().await, Some(chunk(1)));
        assert_eq!(queue.pop().await, None);
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_reader() {
        let queue = Arc::new(BroadcastQueue::new(4));

        let reader = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();

        assert_eq!(reader.await.unwrap(), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(BroadcastQueue::new(0).capacity(), 1);
    }
}
