//! Background receive loop feeding a bounded queue of raw datagrams.

use crate::bip::bvlc::MAX_BIP_FRAME_LEN;
use crate::{Address, DataLink, DataLinkError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default depth of the [`Incoming`] queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// One received NPDU and the address it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub source: Address,
    pub payload: Vec<u8>,
}

/// Handle to the task reading from a [`DataLink`].
///
/// The task stops when the handle is stopped or dropped, when the link
/// reports [`DataLinkError::NotOpen`], or when [`Incoming`] is dropped.
#[derive(Debug)]
pub struct ReceiveLoop {
    task: JoinHandle<()>,
}

/// Consuming side of a [`ReceiveLoop`]. Once the loop ends, every call
/// returns `None`; the sequence cannot be restarted.
#[derive(Debug)]
pub struct Incoming {
    rx: mpsc::Receiver<Datagram>,
}

impl ReceiveLoop {
    /// Spawns the loop on the current tokio runtime.
    pub fn spawn<D: DataLink>(datalink: Arc<D>, capacity: usize) -> (Self, Incoming) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(datalink, tx));
        (Self { task }, Incoming { rx })
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ReceiveLoop {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Incoming {
    pub async fn recv(&mut self) -> Option<Datagram> {
        self.rx.recv().await
    }

    /// Like [`Incoming::recv`], giving up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Datagram>, Elapsed> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .map_err(|_| Elapsed)
    }
}

/// Returned by [`Incoming::recv_timeout`] when nothing arrived in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no datagram received before the timeout")]
pub struct Elapsed;

async fn run<D: DataLink>(datalink: Arc<D>, tx: mpsc::Sender<Datagram>) {
    let mut buf = vec![0u8; MAX_BIP_FRAME_LEN];
    loop {
        match datalink.recv(&mut buf).await {
            Ok((n, source)) => {
                let datagram = Datagram {
                    source,
                    payload: buf[..n].to_vec(),
                };
                // A full queue parks this task, so the socket buffer absorbs
                // the burst instead of the heap.
                if tx.send(datagram).await.is_err() {
                    break;
                }
            }
            Err(DataLinkError::NotOpen) => break,
            Err(err) => log::warn!("receive error: {err}"),
        }
    }
    log::debug!("receive loop stopped");
}
