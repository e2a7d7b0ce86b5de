//! Request envelopes carried over the ingress queue.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::entry::FileEntry;
use crate::error::Result;

/// Tagged operation record. Mutations only; reads never enter the queue.
#[derive(Debug)]
pub(crate) enum Operation {
    /// Terminate the dispatcher. No reply is ever sent.
    Purge,
    Delete {
        path: String,
    },
    Write {
        path: String,
        data: Vec<u8>,
    },
    Create {
        path: String,
    },
}

/// Reply sent back on the envelope's one-shot channel: the created or
/// targeted entry on success (`None` for delete), or the failure.
pub(crate) type Reply = Result<Option<Arc<FileEntry>>>;

/// One envelope: the operation plus its reply channel. Allocated by the
/// client, consumed by the dispatcher, answered exactly once.
pub(crate) struct IoRequest {
    pub op: Operation,
    pub reply: Sender<Reply>,
}

impl IoRequest {
    pub fn new(op: Operation) -> (Self, Receiver<Reply>) {
        let (reply, rx) = bounded(1);
        (Self { op, reply }, rx)
    }
}
