//! Invoke-ID allocation, deadlines, retries and response matching for
//! confirmed requests.

use crate::clock::Clock;
use crate::error::{ErrorKind, Rejection};
use bacwire_core::{EncodeError, Pdu};
use bacwire_datalink::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;

/// What a waiting caller eventually receives.
pub type Outcome = Result<Pdu, ErrorKind>;

/// Identifies one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub destination: Address,
    pub invoke_id: u8,
}

/// Lifecycle of a tracked request. Everything but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending { retries: u8 },
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("all 256 invoke IDs to {0} are in flight")]
    Exhausted(Address),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// A newly tracked request: the frame to send and where the outcome lands.
#[derive(Debug)]
pub struct Submission {
    pub key: RequestKey,
    pub frame: Arc<[u8]>,
    pub receiver: oneshot::Receiver<Outcome>,
}

/// A request whose deadline passed with retries left; resend `frame`.
#[derive(Debug, Clone)]
pub struct Retransmission {
    pub key: RequestKey,
    pub frame: Arc<[u8]>,
    pub attempt: u8,
}

#[derive(Debug)]
struct PendingRequest {
    service_choice: u8,
    frame: Arc<[u8]>,
    deadline: Instant,
    timeout: Duration,
    retries: u8,
    max_retries: u8,
    waiter: oneshot::Sender<Outcome>,
}

/// Cursor entries kept before idle destinations are forgotten.
const MAX_CURSORS: usize = 1024;

#[derive(Debug, Default)]
struct TrackerState {
    pending: HashMap<RequestKey, PendingRequest>,
    cursors: HashMap<Address, u8>,
}

impl TrackerState {
    fn allocate(&mut self, destination: Address) -> Option<u8> {
        let start = self.cursors.get(&destination).copied().unwrap_or(0);
        let invoke_id = (0..=u8::MAX)
            .map(|offset| start.wrapping_add(offset))
            .find(|&invoke_id| {
                !self.pending.contains_key(&RequestKey {
                    destination,
                    invoke_id,
                })
            })?;
        if self.cursors.len() >= MAX_CURSORS && !self.cursors.contains_key(&destination) {
            self.prune_cursors();
        }
        self.cursors.insert(destination, invoke_id.wrapping_add(1));
        Some(invoke_id)
    }

    /// Forgets the cursor of every destination with nothing in flight.
    fn prune_cursors(&mut self) {
        let pending = &self.pending;
        self.cursors
            .retain(|destination, _| pending.keys().any(|key| key.destination == *destination));
        log::debug!("pruned invoke-id cursors, {} destinations active", self.cursors.len());
    }

    /// Exact match first, then a network-equivalent destination.
    fn find(&self, invoke_id: u8, source: &Address) -> Option<RequestKey> {
        let exact = RequestKey {
            destination: *source,
            invoke_id,
        };
        if self.pending.contains_key(&exact) {
            return Some(exact);
        }
        self.pending
            .keys()
            .find(|key| key.invoke_id == invoke_id && key.destination.is_equivalent(source))
            .copied()
    }
}

/// Owns every in-flight confirmed request.
///
/// The lock is never held across an await; all methods are synchronous.
pub struct RequestTracker {
    clock: Arc<dyn Clock>,
    state: Mutex<TrackerState>,
}

impl RequestTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates an invoke ID for `destination`, encodes the request with it
    /// and arms the first deadline.
    pub fn submit<F>(
        &self,
        destination: Address,
        service_choice: u8,
        timeout: Duration,
        max_retries: u8,
        encode: F,
    ) -> Result<Submission, TrackerError>
    where
        F: FnOnce(u8) -> Result<Vec<u8>, EncodeError>,
    {
        let mut state = self.lock();
        let invoke_id = state
            .allocate(destination)
            .ok_or(TrackerError::Exhausted(destination))?;
        let frame: Arc<[u8]> = encode(invoke_id)?.into();
        let (waiter, receiver) = oneshot::channel();
        let key = RequestKey {
            destination,
            invoke_id,
        };
        state.pending.insert(
            key,
            PendingRequest {
                service_choice,
                frame: frame.clone(),
                deadline: self.clock.now() + timeout,
                timeout,
                retries: 0,
                max_retries,
                waiter,
            },
        );
        Ok(Submission {
            key,
            frame,
            receiver,
        })
    }

    /// Resolves the request answered by `pdu`.
    ///
    /// Returns `None` when nothing matches: late and duplicate responses end
    /// up here and are dropped.
    pub fn complete(&self, invoke_id: u8, source: &Address, pdu: Pdu) -> Option<RequestState> {
        let entry = {
            let mut state = self.lock();
            let Some(key) = state.find(invoke_id, source) else {
                log::debug!("discarding late or duplicate response {invoke_id} from {source}");
                return None;
            };
            if let Some(choice) = pdu.service_choice() {
                let expected = state.pending.get(&key).map(|p| p.service_choice);
                if expected != Some(choice) {
                    log::warn!(
                        "response {invoke_id} from {source} names service {choice}, expected {expected:?}"
                    );
                    return None;
                }
            }
            state.pending.remove(&key)?
        };

        let (outcome, next) = match pdu {
            Pdu::Error(err) => (
                Err(ErrorKind::DeviceRejected(Rejection::Error {
                    class: err.error_class,
                    code: err.error_code,
                })),
                RequestState::Failed,
            ),
            Pdu::Reject(rej) => (
                Err(ErrorKind::DeviceRejected(Rejection::Reject { reason: rej.reason })),
                RequestState::Failed,
            ),
            Pdu::Abort(abort) => (
                Err(ErrorKind::DeviceRejected(Rejection::Abort {
                    reason: abort.reason,
                    server: abort.server,
                })),
                RequestState::Failed,
            ),
            other => (Ok(other), RequestState::Completed),
        };
        log::debug!("request {invoke_id} to {source} finished: {next:?}");
        if entry.waiter.send(outcome).is_err() {
            log::debug!("request {invoke_id} to {source} has no waiter left");
        }
        Some(next)
    }

    /// Scans for passed deadlines. Requests with retries left are re-armed
    /// and returned for resending; the rest fail with [`ErrorKind::Timeout`].
    pub fn poll_expired(&self) -> Vec<Retransmission> {
        let now = self.clock.now();
        let mut resend = Vec::new();
        let mut expired = Vec::new();
        {
            let mut state = self.lock();
            let due: Vec<RequestKey> = state
                .pending
                .iter()
                .filter(|(_, p)| p.deadline <= now)
                .map(|(key, _)| *key)
                .collect();
            for key in due {
                let Some(pending) = state.pending.get_mut(&key) else {
                    continue;
                };
                if pending.retries < pending.max_retries {
                    pending.retries += 1;
                    pending.deadline = now + pending.timeout;
                    resend.push(Retransmission {
                        key,
                        frame: pending.frame.clone(),
                        attempt: pending.retries,
                    });
                } else if let Some(pending) = state.pending.remove(&key) {
                    expired.push((key, pending));
                }
            }
        }

        for retry in &resend {
            log::debug!(
                "retrying request {} to {} (attempt {})",
                retry.key.invoke_id,
                retry.key.destination,
                retry.attempt
            );
        }
        for (key, pending) in expired {
            log::warn!(
                "request {} to {} timed out after {} retries",
                key.invoke_id,
                key.destination,
                pending.retries
            );
            let _ = pending.waiter.send(Err(ErrorKind::Timeout));
        }
        resend
    }

    /// Cancels one request, delivering [`ErrorKind::Cancelled`] to its waiter.
    pub fn cancel(&self, key: &RequestKey) -> bool {
        let removed = self.lock().pending.remove(key);
        match removed {
            Some(pending) => {
                log::debug!("request {} to {} cancelled", key.invoke_id, key.destination);
                let _ = pending.waiter.send(Err(ErrorKind::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Cancels everything in flight and returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.lock().pending.drain().collect();
        let count = drained.len();
        for (_, pending) in drained {
            let _ = pending.waiter.send(Err(ErrorKind::Cancelled));
        }
        if count > 0 {
            log::debug!("cancelled {count} in-flight requests");
        }
        count
    }

    /// Drops a request without notifying its waiter; used when the first
    /// send fails and the caller reports that error itself.
    pub fn abandon(&self, key: &RequestKey) {
        self.lock().pending.remove(key);
    }

    pub fn state(&self, key: &RequestKey) -> Option<RequestState> {
        self.lock()
            .pending
            .get(key)
            .map(|p| RequestState::Pending { retries: p.retries })
    }

    pub fn in_flight(&self, destination: &Address) -> usize {
        self.lock()
            .pending
            .keys()
            .filter(|key| key.destination == *destination)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Destinations whose invoke-ID cursor is remembered.
    pub fn known_destinations(&self) -> usize {
        self.lock().cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("in_flight", &self.len())
            .finish()
    }
}
