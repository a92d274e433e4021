//! Session state handler registry.
//!
//! The shared table only records *where* a handler lives (profile index and
//! owning context). The callback itself stays on the thread of the context
//! that registered it, in a thread-local map, and every delivery or removal
//! is executed there. A delivery that was already queued when its handler
//! got removed finds nothing in that map and is dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use tokio::sync::oneshot;

use crate::core::context::{self, ContextHandle};
use crate::core::errors::{MdcError, Result};
use crate::core::manager::Profile;
use crate::radio::interface::ConState;

type Callback = Box<dyn FnMut(&Profile, ConState)>;

thread_local! {
    static LOCAL_HANDLERS: RefCell<HashMap<SessionStateHandlerRef, Callback>> =
        RefCell::new(HashMap::new());
}

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Reference returned by `add_session_state_handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionStateHandlerRef(u64);

struct Registration {
    profile_index: u32,
    context: ContextHandle,
}

/// Outcome of a removal request.
#[must_use]
#[derive(Debug)]
pub enum Removal {
    /// Removed synchronously; the caller was the owning context.
    Completed,
    /// Forwarded to the owning context; resolves once it has run there.
    Deferred(oneshot::Receiver<()>),
}

impl Removal {
    pub fn is_completed(&self) -> bool {
        matches!(self, Removal::Completed)
    }

    pub async fn wait(self) -> Result<()> {
        match self {
            Removal::Completed => Ok(()),
            Removal::Deferred(done) => done
                .await
                .map_err(|_| MdcError::fault("owning context ended before removing the handler")),
        }
    }
}

/// A removal queued onto the owning context. If the context stops before
/// running it, the task is dropped unrun and the registration goes with it.
struct ForwardedRemoval {
    hub: Arc<NotificationHub>,
    handler: SessionStateHandlerRef,
    done: Option<oneshot::Sender<()>>,
}

impl ForwardedRemoval {
    fn run(mut self) {
        self.hub.remove_local(self.handler);
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl Drop for ForwardedRemoval {
    fn drop(&mut self) {
        if self.done.is_some() {
            warn!(
                "Removal of {:?} discarded by its context, dropping the registration",
                self.handler
            );
            self.hub.registrations().remove(&self.handler);
        }
    }
}

#[derive(Default)]
pub(crate) struct NotificationHub {
    registrations: Mutex<HashMap<SessionStateHandlerRef, Registration>>,
}

impl NotificationHub {
    fn registrations(&self) -> MutexGuard<'_, HashMap<SessionStateHandlerRef, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called from inside a context; the handler is bound to it.
    pub(crate) fn add(
        &self,
        profile: &Profile,
        callback: impl FnMut(&Profile, ConState) + 'static,
    ) -> Result<SessionStateHandlerRef> {
        let context = context::current().ok_or_else(|| {
            MdcError::fault("session state handlers must be added from inside a context")
        })?;
        let handler = SessionStateHandlerRef(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed));

        LOCAL_HANDLERS.with(|h| h.borrow_mut().insert(handler, Box::new(callback)));
        debug!(
            "Handler {:?} for profile {} registered on context '{}'",
            handler,
            profile.index(),
            context.name()
        );
        self.registrations().insert(
            handler,
            Registration {
                profile_index: profile.index(),
                context,
            },
        );
        Ok(handler)
    }

    pub(crate) fn remove(self: &Arc<Self>, handler: SessionStateHandlerRef) -> Result<Removal> {
        let owner = self
            .registrations()
            .get(&handler)
            .map(|r| r.context.clone())
            .ok_or_else(|| MdcError::not_found(format!("no handler {:?}", handler)))?;

        if context::current_id() == Some(owner.id()) {
            self.remove_local(handler);
            return Ok(Removal::Completed);
        }

        debug!(
            "Forwarding removal of {:?} to context '{}'",
            handler,
            owner.name()
        );
        let (done_tx, done_rx) = oneshot::channel();
        let forwarded = ForwardedRemoval {
            hub: Arc::clone(self),
            handler,
            done: Some(done_tx),
        };
        let queued = owner.queue_function(move || forwarded.run());
        if let Err(e) = queued {
            warn!("Cannot remove {:?}: {}", handler, e);
            self.registrations().remove(&handler);
            return Err(e);
        }
        Ok(Removal::Deferred(done_rx))
    }

    /// Runs on the owning context.
    fn remove_local(&self, handler: SessionStateHandlerRef) {
        self.registrations().remove(&handler);
        LOCAL_HANDLERS.with(|h| h.borrow_mut().remove(&handler));
        debug!("Handler {:?} removed", handler);
    }

    /// Queue one delivery per handler registered for the profile. Never calls
    /// a handler inline, even when the publisher runs on the owning context.
    pub(crate) fn publish(self: &Arc<Self>, profile: &Profile, state: ConState) {
        let targets: Vec<(SessionStateHandlerRef, ContextHandle)> = self
            .registrations()
            .iter()
            .filter(|(_, r)| r.profile_index == profile.index())
            .map(|(h, r)| (*h, r.context.clone()))
            .collect();

        for (handler, context) in targets {
            let hub = Arc::clone(self);
            let profile = profile.clone();
            let queued =
                context.queue_function(move || hub.deliver(handler, &profile, state));
            if queued.is_err() {
                warn!(
                    "Context '{}' has terminated, dropping handler {:?}",
                    context.name(),
                    handler
                );
                self.registrations().remove(&handler);
            }
        }
    }

    /// Runs on the owning context.
    fn deliver(&self, handler: SessionStateHandlerRef, profile: &Profile, state: ConState) {
        // Taken out for the call so the handler may add or remove handlers itself.
        let Some(mut callback) = LOCAL_HANDLERS.with(|h| h.borrow_mut().remove(&handler)) else {
            debug!("Dropping {:?} event for removed handler {:?}", state, handler);
            return;
        };
        callback(profile, state);
        if self.registrations().contains_key(&handler) {
            LOCAL_HANDLERS.with(|h| h.borrow_mut().insert(handler, callback));
        }
    }

    pub(crate) fn handler_count(&self, profile_index: u32) -> usize {
        self.registrations()
            .values()
            .filter(|r| r.profile_index == profile_index)
            .count()
    }
}
