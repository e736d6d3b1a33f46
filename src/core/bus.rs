use flume::{Receiver, Sender, TryRecvError};

use crate::core::request::{HttpResponse, RequestId, TransportError};

/// Finished request, sent from transport workers back to the kit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: RequestId,
    pub result: Result<HttpResponse, TransportError>,
}

/// Channel pair carrying completions. Workers get clones of the sender, the
/// single-threaded kit drains the receiver between input events.
#[derive(Debug, Clone)]
pub struct Bus {
    pub completion_tx: Sender<Completion>,
    pub completion_rx: Receiver<Completion>,
}

impl Bus {
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = flume::unbounded();
        Self {
            completion_tx,
            completion_rx,
        }
    }

    /// Everything that has arrived so far, without blocking.
    pub fn drain(&self) -> Vec<Completion> {
        let mut out = Vec::new();
        loop {
            match self.completion_rx.try_recv() {
                Ok(completion) => out.push(completion),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
