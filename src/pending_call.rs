//! A handle to a method call awaiting its reply (§3, §4.D).
//!
//! One `PendingCall` is created per `send_with_reply`, bound to the
//! outbound message's serial. A connection's inbound dispatch resolves it
//! exactly once, whether that happens synchronously inside `dispatch()` or
//! via a blocking wait; cancelling it at any later point silently discards
//! a reply that arrives anyway (§4.D "Pending-call matching").

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{ErrorKind, Result};
use crate::message::Message;

enum Outcome {
    Pending,
    Ready(Result<Message>),
    Cancelled,
}

type Callback = Box<dyn FnOnce(Result<Message>) + Send>;

struct Shared {
    outcome: Mutex<Outcome>,
    signal: Condvar,
    /// When this call times out even if nobody ever calls `wait`: checked
    /// lazily by `is_ready`/`try_take` (the callback/cooperative-async
    /// forms poll these) and proactively by the connection's dispatch
    /// sweep, so a call left unpolled still eventually resolves instead of
    /// staying `Pending` forever.
    deadline: Option<Instant>,
    /// A one-shot callback registered through `on_ready`, fired the next
    /// time the outcome is observed to be `Ready` — by a reply arriving,
    /// a deadline expiring, or `on_ready` itself being called after the
    /// fact.
    callback: Mutex<Option<Callback>>,
}

impl Shared {
    fn expire_if_due(&self) {
        let Some(deadline) = self.deadline else { return };
        if Instant::now() < deadline {
            return;
        }
        {
            let mut outcome = self.outcome.lock().unwrap();
            if matches!(*outcome, Outcome::Pending) {
                *outcome = Outcome::Ready(Err(ErrorKind::NoReply.at()));
                self.signal.notify_all();
            }
        }
        self.fire_callback_if_ready();
    }

    /// If the outcome is `Ready` and a callback is registered, take both
    /// and run the callback outside any lock. A no-op otherwise, so it's
    /// safe to call speculatively from `resolve`, `expire_if_due`, and
    /// `on_ready` alike.
    fn fire_callback_if_ready(&self) {
        let result = {
            let mut outcome = self.outcome.lock().unwrap();
            if !matches!(*outcome, Outcome::Ready(_)) {
                return;
            }
            if self.callback.lock().unwrap().is_none() {
                return;
            }
            let Outcome::Ready(result) = std::mem::replace(&mut *outcome, Outcome::Cancelled) else {
                unreachable!()
            };
            result
        };
        let callback = self.callback.lock().unwrap().take();
        if let Some(callback) = callback {
            callback(result);
        }
    }
}

/// A method call's reply, in flight.
///
/// Cloning shares the same underlying slot: any clone observes the same
/// eventual outcome, and cancelling through any clone cancels all of them.
#[derive(Clone)]
pub struct PendingCall {
    serial: u32,
    shared: Arc<Shared>,
}

/// The other half of a [`PendingCall`], held by the connection that
/// created it and resolved exactly once when a matching reply (or a
/// local failure) arrives.
pub(crate) struct PendingCallSlot {
    shared: Arc<Shared>,
}

pub(crate) fn new_pending_call(serial: u32, deadline: Option<Instant>) -> (PendingCall, PendingCallSlot) {
    let shared = Arc::new(Shared {
        outcome: Mutex::new(Outcome::Pending),
        signal: Condvar::new(),
        deadline,
        callback: Mutex::new(None),
    });
    (
        PendingCall { serial, shared: shared.clone() },
        PendingCallSlot { shared },
    )
}

impl PendingCall {
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// True once a reply, a local failure, or a timeout has been
    /// recorded, whether or not it has been retrieved yet.
    pub fn is_ready(&self) -> bool {
        self.shared.expire_if_due();
        !matches!(*self.shared.outcome.lock().unwrap(), Outcome::Pending)
    }

    /// Take the reply if one has already arrived, without blocking. Also
    /// surfaces a timeout once this call's deadline has passed, the same
    /// way a late reply or a local I/O failure would.
    pub fn try_take(&self) -> Option<Result<Message>> {
        self.shared.expire_if_due();
        let mut outcome = self.shared.outcome.lock().unwrap();
        match std::mem::replace(&mut *outcome, Outcome::Pending) {
            Outcome::Ready(result) => Some(result),
            other => {
                *outcome = other;
                None
            }
        }
    }

    /// Register a one-shot callback to run with the reply, rather than
    /// polling `try_take` from a loop — the callback form of §4.F's
    /// "callback, or cooperative-async" non-blocking call. Fired the next
    /// time the connection's dispatch resolves this call, or immediately
    /// if it's already resolved by the time this is called. Only one
    /// callback may be registered; a later call replaces an earlier one
    /// that hasn't fired yet.
    pub fn on_ready(&self, callback: impl FnOnce(Result<Message>) + Send + 'static) {
        *self.shared.callback.lock().unwrap() = Some(Box::new(callback));
        self.shared.expire_if_due();
        self.shared.fire_callback_if_ready();
    }

    /// Block the calling thread until the reply arrives or `timeout`
    /// elapses, driving no dispatch of its own — the caller (typically
    /// `send_with_reply_blocking`) is responsible for pumping I/O that
    /// might deliver the reply.
    pub(crate) fn wait(&self, timeout: Duration) -> Result<Message> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.shared.outcome.lock().unwrap();
        loop {
            match &*outcome {
                Outcome::Ready(_) => {
                    let Outcome::Ready(result) = std::mem::replace(&mut *outcome, Outcome::Cancelled) else {
                        unreachable!()
                    };
                    return result;
                }
                Outcome::Cancelled => return Err(ErrorKind::Disconnected.at()),
                Outcome::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ErrorKind::NoReply.at());
            }
            let (guard, timed_out) = self
                .shared
                .signal
                .wait_timeout(outcome, deadline - now)
                .unwrap();
            outcome = guard;
            if timed_out.timed_out() && matches!(*outcome, Outcome::Pending) {
                return Err(ErrorKind::NoReply.at());
            }
        }
    }

    /// Discard this pending call. A reply that arrives afterward is
    /// silently dropped by the connection.
    pub fn cancel(&self) {
        let mut outcome = self.shared.outcome.lock().unwrap();
        if matches!(*outcome, Outcome::Pending) {
            *outcome = Outcome::Cancelled;
            self.shared.signal.notify_all();
        }
    }
}

impl PendingCallSlot {
    /// Resolve the call with `result`, waking any blocked waiter and
    /// firing a registered `on_ready` callback. A no-op if the call was
    /// already cancelled.
    pub(crate) fn resolve(self, result: Result<Message>) {
        {
            let mut outcome = self.shared.outcome.lock().unwrap();
            if matches!(*outcome, Outcome::Pending) {
                *outcome = Outcome::Ready(result);
                self.shared.signal.notify_all();
            }
        }
        self.shared.fire_callback_if_ready();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(*self.shared.outcome.lock().unwrap(), Outcome::Cancelled)
    }

    /// Expire this slot if its deadline has passed, reporting whether it's
    /// now resolved (by expiry, a reply, or cancellation) one way or
    /// another. Used by a connection's dispatch sweep to reap calls that
    /// timed out without anyone ever polling them via `try_take`.
    pub(crate) fn expire_if_due(&self) -> bool {
        self.shared.expire_if_due();
        !matches!(*self.shared.outcome.lock().unwrap(), Outcome::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::MemberName;
    use crate::object_path::ObjectPath;

    fn sample_message(serial: u32) -> Message {
        let path = ObjectPath::new("/org/example/Object").unwrap();
        let member = MemberName::new("Ping").unwrap();
        Message::method_call(path, member).build(serial).unwrap()
    }

    #[test]
    fn resolves_and_takes_once() {
        let (call, slot) = new_pending_call(7, None);
        assert!(!call.is_ready());
        slot.resolve(Ok(sample_message(7)));
        assert!(call.is_ready());
        assert!(call.try_take().unwrap().is_ok());
        assert!(call.try_take().is_none());
    }

    #[test]
    fn cancel_is_silent_and_idempotent() {
        let (call, slot) = new_pending_call(7, None);
        call.cancel();
        assert!(slot.is_cancelled());
        slot.resolve(Ok(sample_message(7)));
        assert!(slot.is_cancelled());
    }

    #[test]
    fn wait_times_out_when_unresolved() {
        let (call, _slot) = new_pending_call(7, None);
        let result = call.wait(Duration::from_millis(10));
        assert!(result.is_err());
    }

    #[test]
    fn on_ready_fires_once_a_reply_resolves_the_call() {
        use std::sync::{Arc, Mutex as StdMutex};

        let (call, slot) = new_pending_call(7, None);
        let seen = Arc::new(StdMutex::new(None));
        let seen_callback = seen.clone();
        call.on_ready(move |result| {
            *seen_callback.lock().unwrap() = Some(result.is_ok());
        });
        assert!(seen.lock().unwrap().is_none());
        slot.resolve(Ok(sample_message(7)));
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn on_ready_fires_immediately_when_already_resolved() {
        use std::sync::{Arc, Mutex as StdMutex};

        let (call, slot) = new_pending_call(7, None);
        slot.resolve(Ok(sample_message(7)));
        let seen = Arc::new(StdMutex::new(false));
        let seen_callback = seen.clone();
        call.on_ready(move |_| *seen_callback.lock().unwrap() = true);
        assert!(*seen.lock().unwrap());
    }

    #[test]
    fn unpolled_call_expires_once_its_deadline_passes() {
        let (call, _slot) = new_pending_call(7, Some(Instant::now()));
        assert!(call.is_ready());
        let err = call.try_take().unwrap().unwrap_err();
        assert!(err.to_string().contains("timed out"));
        // The connection-side sweep observes the same expiry, even if
        // nobody ever calls `try_take` on the caller-facing handle.
        let (call, slot) = new_pending_call(7, Some(Instant::now()));
        drop(call);
        assert!(slot.expire_if_due());
    }
}
