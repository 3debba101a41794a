//! Bounded crawl queue
//!
//! FIFO over all workers with backpressure: a worker enqueueing discovered
//! children into a full queue blocks until a consumer makes room, which
//! throttles discovery to the drain rate. Termination rides the queue as
//! sentinel entries: a worker that dequeues one exits its loop.

use crate::page::ScraperUrl;
use crate::{Result, SkimmerError};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// One slot of the crawl queue
#[derive(Debug)]
pub enum QueueItem {
    /// Work: a URL for one worker to process exactly once
    Url(ScraperUrl),

    /// Terminal marker: the receiving worker exits
    Terminate,
}

/// Bounded multi-worker FIFO
///
/// The receiver is shared behind a mutex so any worker can dequeue; the
/// sender side is cloned freely for enqueueing from workers and `stop()`.
pub struct CrawlQueue {
    tx: mpsc::Sender<QueueItem>,
    rx: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
}

impl CrawlQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Enqueues an item, waiting while the queue is full.
    ///
    /// Fails only on a closed queue, which means the crawler was used after
    /// its run ended — a contract violation, not a crawl condition.
    pub async fn push(&self, item: QueueItem) -> Result<()> {
        self.tx
            .send(item)
            .await
            .map_err(|_| SkimmerError::Closed("enqueue on closed crawl queue".to_string()))
    }

    /// Dequeues the next item; `None` means the queue was closed.
    pub async fn pop(&self) -> Option<QueueItem> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn url(raw: &str) -> ScraperUrl {
        ScraperUrl::parse(raw, 1).unwrap()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = CrawlQueue::new(8);
        queue.push(QueueItem::Url(url("https://a.test/1"))).await.unwrap();
        queue.push(QueueItem::Url(url("https://a.test/2"))).await.unwrap();

        match queue.pop().await.unwrap() {
            QueueItem::Url(u) => assert!(u.raw.ends_with("/1")),
            QueueItem::Terminate => panic!("expected url"),
        }
        match queue.pop().await.unwrap() {
            QueueItem::Url(u) => assert!(u.raw.ends_with("/2")),
            QueueItem::Terminate => panic!("expected url"),
        }
    }

    #[tokio::test]
    async fn test_full_queue_blocks_producer() {
        let queue = CrawlQueue::new(1);
        queue.push(QueueItem::Url(url("https://a.test/1"))).await.unwrap();

        let second = queue.push(QueueItem::Url(url("https://a.test/2")));
        let blocked = tokio::time::timeout(Duration::from_millis(50), second).await;
        assert!(blocked.is_err(), "push into a full queue must block");
    }

    #[tokio::test]
    async fn test_pop_unblocks_producer() {
        let queue = Arc::new(CrawlQueue::new(1));
        queue.push(QueueItem::Url(url("https://a.test/1"))).await.unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.push(QueueItem::Url(url("https://a.test/2"))).await
            })
        };

        assert!(queue.pop().await.is_some());
        let pushed = tokio::time::timeout(Duration::from_millis(500), producer).await;
        assert!(pushed.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_terminate_markers_wake_waiters() {
        let queue = Arc::new(CrawlQueue::new(4));
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        queue.push(QueueItem::Terminate).await.unwrap();
        let item = tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(item, Some(QueueItem::Terminate)));
    }
}
