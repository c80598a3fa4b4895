// One-request-at-a-time bookkeeping shared by the coordinators
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    handle: Option<AbortHandle>,
}

/// Permission to run exactly one request through an [`InFlight`] slot
#[derive(Debug)]
pub struct RequestTicket {
    generation: u64,
    registration: AbortRegistration,
}

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Tracks the single in-flight request of a coordinator.
///
/// Starting a request aborts whatever was running before. Every request is
/// stamped with a generation number, and only the newest generation may
/// settle. So even if an abort loses the race and a stale response makes it
/// back, it gets dropped on the floor instead of rendered.
#[derive(Debug, Default)]
pub struct InFlight {
    slot: Mutex<Slot>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Slot is two plain fields, a panic mid-update can't leave it torn
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel the previous request (if any) and issue a ticket for a new one.
    ///
    /// `on_start` runs while the slot is locked, so whatever it publishes
    /// can't land after a newer request has already settled.
    pub fn begin(&self, on_start: impl FnOnce()) -> RequestTicket {
        let (handle, registration) = AbortHandle::new_pair();
        let mut slot = self.lock();

        if let Some(previous) = slot.handle.replace(handle) {
            previous.abort();
        }
        slot.generation += 1;
        on_start();

        RequestTicket {
            generation: slot.generation,
            registration,
        }
    }

    /// Abort the running request without starting another.
    ///
    /// `then` runs under the same lock and is told whether something was
    /// actually in flight.
    pub fn cancel<R>(&self, then: impl FnOnce(bool) -> R) -> R {
        let mut slot = self.lock();
        slot.generation += 1;
        let was_active = match slot.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        };
        then(was_active)
    }

    pub fn is_active(&self) -> bool {
        self.lock().handle.is_some()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Drive `request` under `ticket`. `None` means it was aborted.
    ///
    /// A `Some` result can still be stale - use [`InFlight::settle`] to
    /// apply it.
    pub async fn run<F>(&self, ticket: RequestTicket, request: F) -> Option<F::Output>
    where
        F: Future,
    {
        Abortable::new(request, ticket.registration).await.ok()
    }

    /// Apply a finished request's result, but only if nothing newer started.
    ///
    /// `apply` runs while the slot is locked, so a concurrent `begin` can't
    /// slip in between the freshness check and the state update.
    pub fn settle<R>(&self, generation: u64, apply: impl FnOnce() -> R) -> Option<R> {
        let mut slot = self.lock();
        if slot.generation != generation {
            return None;
        }
        slot.handle = None;
        Some(apply())
    }
}
