//! Single-slot correlation handoff between the requesting task and the
//! inbound delivery task.
//!
//! The request gate in the client serializes callers, so the slot holds at
//! most one pending request at any time. Delivery resolves the slot only
//! on an exact token match; everything else leaves the waiter and its
//! timeout untouched.

use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::wire::IomMessage;

struct PendingRequest {
    token: u64,
    sender: oneshot::Sender<IomMessage>,
}

#[derive(Default)]
pub(super) struct CorrelationSlot {
    pending: Mutex<Option<PendingRequest>>,
}

/// Outcome of offering an inbound response to the slot.
pub(super) enum Resolution {
    /// Token matched; the waiter was handed the message.
    Delivered,
    /// A request is outstanding under a different token.
    TokenMismatch { outstanding: u64 },
    /// No request is outstanding at all.
    NoOutstanding,
}

impl CorrelationSlot {
    pub(super) fn new() -> Self {
        CorrelationSlot::default()
    }

    /// Installs the waiter for `token` and returns the receiving half.
    /// Must be called before the request is published, so a response
    /// cannot arrive ahead of its waiter.
    pub(super) fn install(&self, token: u64) -> oneshot::Receiver<IomMessage> {
        let (sender, receiver) = oneshot::channel();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending = Some(PendingRequest { token, sender });
        receiver
    }

    /// Offers an inbound response; the slot is cleared only on a match.
    pub(super) fn resolve(&self, token: u64, message: IomMessage) -> Resolution {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_ref() {
            None => Resolution::NoOutstanding,
            Some(request) if request.token != token => Resolution::TokenMismatch {
                outstanding: request.token,
            },
            Some(_) => {
                if let Some(request) = pending.take() {
                    // A receiver dropped by a racing timeout is fine; the
                    // caller already reported the timeout.
                    let _ = request.sender.send(message);
                }
                Resolution::Delivered
            }
        }
    }

    /// Clears the slot if it still belongs to `token` (timeout path).
    pub(super) fn clear(&self, token: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending
            .as_ref()
            .is_some_and(|request| request.token == token)
        {
            *pending = None;
        }
    }
}
