use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::sync::mpsc;

/// Creates the two ends of a process's work-token queue.
///
/// # Returns
/// The `TokenMailbox` peers deliver into and the `TokenQueue` the training
/// loop consumes.
pub fn mailbox() -> (TokenMailbox, TokenQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    let mailbox = TokenMailbox {
        tx,
        depth: Arc::clone(&depth),
    };

    let queue = TokenQueue {
        rx,
        pending: VecDeque::new(),
        depth,
    };

    (mailbox, queue)
}

/// The receiving end of remote token transfers, shared by every connection
/// serving the process.
#[derive(Debug, Clone)]
pub struct TokenMailbox {
    tx: mpsc::UnboundedSender<usize>,
    depth: Arc<AtomicUsize>,
}

impl TokenMailbox {
    /// Appends `item` to the back of the queue.
    ///
    /// # Returns
    /// `false` if the queue has already been dropped.
    pub fn deliver(&self, item: usize) -> bool {
        self.depth.fetch_add(1, Ordering::AcqRel);

        if self.tx.send(item).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return false;
        }

        true
    }

    /// Returns the amount of tokens held, including those in flight to the
    /// training loop.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

/// A FIFO of item indices owned by a single training loop.
#[derive(Debug)]
pub struct TokenQueue {
    rx: mpsc::UnboundedReceiver<usize>,
    pending: VecDeque<usize>,
    depth: Arc<AtomicUsize>,
}

impl TokenQueue {
    fn drain_mailbox(&mut self) {
        while let Ok(item) = self.rx.try_recv() {
            self.pending.push_back(item);
        }
    }

    /// Appends `item` to the back of the queue, used while seeding tokens.
    pub fn enqueue_local(&mut self, item: usize) {
        self.drain_mailbox();
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.pending.push_back(item);
    }

    /// Pops the oldest token, if any.
    pub fn pop_front(&mut self) -> Option<usize> {
        self.drain_mailbox();

        let item = self.pending.pop_front()?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    /// Returns the amount of tokens held.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
