//! Execution contexts: named threads that serially drain a task queue.
//!
//! A context is the unit of thread affinity for session state handlers.
//! Anything that must run "in" a context is queued onto it with
//! [`ContextHandle::queue_function`] and executed in FIFO order.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::core::errors::{MdcError, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum ContextEvent {
    Run(Task),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<ContextHandle>> = const { RefCell::new(None) };
}

/// Returns the context the calling thread is running, if any.
pub fn current() -> Option<ContextHandle> {
    CURRENT.with(|c| c.borrow().clone())
}

pub(crate) fn current_id() -> Option<ContextId> {
    CURRENT.with(|c| c.borrow().as_ref().map(|h| h.id))
}

/// Cheap, clonable address of a running context.
#[derive(Clone)]
pub struct ContextHandle {
    id: ContextId,
    name: Arc<str>,
    tx: mpsc::UnboundedSender<ContextEvent>,
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl ContextHandle {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `f` to run inside this context, after everything already queued.
    pub fn queue_function(&self, f: impl FnOnce() + Send + 'static) -> Result<()> {
        self.tx
            .send(ContextEvent::Run(Box::new(f)))
            .map_err(|_| MdcError::fault(format!("context '{}' has terminated", self.name)))
    }

    pub fn is_terminated(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owns the thread behind a context.
///
/// Dropping the loop stops it once the tasks already queued have run.
pub struct EventLoop {
    handle: ContextHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl EventLoop {
    /// Spawn a context thread. `init` runs first, inside the context, which is
    /// where handlers that should live on this context get registered.
    pub fn spawn(name: &str, init: impl FnOnce() + Send + 'static) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<ContextEvent>();
        let handle = ContextHandle {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            name: Arc::from(name),
            tx,
        };

        let own_handle = handle.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let name = own_handle.name.clone();
                CURRENT.with(|c| *c.borrow_mut() = Some(own_handle));
                info!("Context '{}' started.", name);
                init();

                while let Some(event) = rx.blocking_recv() {
                    match event {
                        ContextEvent::Run(task) => task(),
                        ContextEvent::Stop => {
                            debug!("Stop received for context '{}'.", name);
                            break;
                        }
                    }
                }
                // Anything queued after Stop is discarded with the receiver.
                rx.close();
                CURRENT.with(|c| c.borrow_mut().take());
                info!("Context '{}' ended.", name);
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &ContextHandle {
        &self.handle
    }

    /// Stop after the already-queued tasks and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let _ = self.handle.tx.send(ContextEvent::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                // Dropped from inside its own context; the loop exits on Stop.
                return;
            }
            if thread.join().is_err() {
                warn!("Context '{}' panicked.", self.handle.name);
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
