use crate::message::{MessageId, ProducerMessage};
use crate::Result;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// One-shot sender used to post a publish result back to a waiting caller.
/// `None` marks a fire-and-forget publish.
pub(crate) type ReplyHandle = Option<oneshot::Sender<Result<MessageId>>>;

/// FIFO of messages awaiting batched dispatch.
///
/// Insertion order is the broker-visible send order and must not be
/// permuted.
#[derive(Default)]
pub(crate) struct BatchQueue {
    entries: VecDeque<(ProducerMessage, ReplyHandle)>,
}

impl BatchQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, message: ProducerMessage, reply: ReplyHandle) {
        self.entries.push_back((message, reply));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, returning messages and reply handles as parallel
    /// vectors in insertion order.
    pub(crate) fn drain(&mut self) -> (Vec<ProducerMessage>, Vec<ReplyHandle>) {
        let mut messages = Vec::with_capacity(self.entries.len());
        let mut replies = Vec::with_capacity(self.entries.len());
        for (message, reply) in self.entries.drain(..) {
            messages.push(message);
            replies.push(reply);
        }
        (messages, replies)
    }
}
