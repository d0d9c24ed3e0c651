//! Build event channel.
//!
//! The orchestrator owns one [`EventChannel`] and hands out clones; there is
//! no process-global bus. Listeners run synchronously on the emitting task.
//! A listener may emit while being invoked: emission snapshots the listener
//! list before calling out, so re-entrant emits never deadlock.

use std::sync::Arc;

use parking_lot::RwLock;
use twofold_config::Target;

use crate::compiler::CompileResult;
use crate::dev::DevMiddleware;

/// Events published during a build lifecycle.
#[derive(Clone)]
pub enum BuildEvent {
    /// A compile pass over one target finished without being rejected.
    Done {
        target: Target,
        result: Arc<CompileResult>,
    },
    /// The development middleware is ready to serve requests. Published at
    /// most once per orchestrator.
    Middleware(DevMiddleware),
}

impl std::fmt::Debug for BuildEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildEvent::Done { target, result } => f
                .debug_struct("Done")
                .field("target", target)
                .field("diagnostics", &result.diagnostics.len())
                .finish(),
            BuildEvent::Middleware(_) => f.write_str("Middleware"),
        }
    }
}

type Listener = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

/// Multi-listener event channel.
#[derive(Clone, Default)]
pub struct EventChannel {
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every subsequent event.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&BuildEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Deliver an event to every listener registered at emission time.
    pub fn emit(&self, event: BuildEvent) {
        let snapshot: Vec<Listener> = self.listeners.read().clone();
        for listener in snapshot {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}
