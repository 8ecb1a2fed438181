use crossbeam_channel::{Receiver, Sender, TryRecvError};

use tracing::debug;

use crate::recording_pipeline::common::error::{RecorderError, Result};
use crate::recording_pipeline::raw::types::RawFrame;

/// A frame tagged with the session it was accepted into.
#[derive(Debug)]
pub struct QueuedFrame {
    pub session_id: String,
    /// Position at enqueue time; the file counter is assigned later, at encode time.
    pub enqueue_index: usize,
    pub frame: RawFrame,
}

#[derive(Debug)]
pub enum QueueItem {
    Frame(QueuedFrame),
    EndOfSession,
}

/// Unbounded FIFO between the capture loop and the encode worker.
///
/// Capacity is governed by the recorder's frame cap, never by blocking the producer.
pub struct FrameBuffer {
    tx: Sender<QueueItem>,
    rx: Receiver<QueueItem>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Never blocks.
    pub fn push_frame(&self, frame: QueuedFrame) -> Result<()> {
        self.tx
            .send(QueueItem::Frame(frame))
            .map_err(|_| RecorderError::InvalidFrame("frame queue is disconnected".to_string()))
    }

    pub fn push_end_of_session(&self) -> Result<()> {
        self.tx.send(QueueItem::EndOfSession).map_err(|_| {
            RecorderError::InvalidFrame("frame queue is disconnected".to_string())
        })
    }

    pub fn depth(&self) -> usize {
        self.tx.len()
    }

    /// Throws away everything still queued, returning how many frames were discarded.
    pub fn discard_pending(&self) -> usize {
        let discarded = self
            .rx
            .try_iter()
            .filter(|item| matches!(item, QueueItem::Frame(_)))
            .count();
        if discarded > 0 {
            debug!(discarded, "Discarded stale queued frames");
        }
        discarded
    }

    pub fn consumer(&self) -> FrameConsumer {
        FrameConsumer {
            rx: self.rx.clone(),
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// The worker's end of a [`FrameBuffer`].
pub struct FrameConsumer {
    rx: Receiver<QueueItem>,
}

impl FrameConsumer {
    /// Blocks until the next item. A queue whose producer is gone reads as end of session.
    pub fn next(&self) -> QueueItem {
        self.rx.recv().unwrap_or(QueueItem::EndOfSession)
    }

    /// Non-blocking variant of [`FrameConsumer::next`].
    pub fn try_next(&self) -> Option<QueueItem> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(QueueItem::EndOfSession),
        }
    }
}
