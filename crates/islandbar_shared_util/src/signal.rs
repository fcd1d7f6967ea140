//! Single-threaded signal/handler registry.
//!
//! Objects that emit events (compositor windows, tray items, the tray itself) own one [`Signal`]
//! per event kind. Consumers [`Signal::connect`] a handler and receive a [`HandlerId`], which they
//! must hand back to [`Signal::disconnect`] when they stop caring. Handler ids are unique across
//! all signals of the process, so an object owning several signals can route a `disconnect` call
//! without knowing which signal the handler was attached to.

use std::{
    cell::RefCell,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Token identifying a connected handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Handler<A> = Rc<dyn Fn(&A)>;

pub struct Signal<A: ?Sized = ()> {
    handlers: RefCell<Vec<(HandlerId, Handler<A>)>>,
}

impl<A: ?Sized> Default for Signal<A> {
    fn default() -> Self {
        Self { handlers: RefCell::new(Vec::new()) }
    }
}

impl<A: ?Sized> std::fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = self.handlers.borrow().iter().map(|(id, _)| *id).collect::<Vec<_>>();
        f.debug_struct("Signal").field("handlers", &ids).finish()
    }
}

impl<A: ?Sized> Signal<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<F: Fn(&A) + 'static>(&self, f: F) -> HandlerId {
        let id = HandlerId::next();
        self.handlers.borrow_mut().push((id, Rc::new(f)));
        id
    }

    /// Remove a handler. Returns `false` if the handler was not connected to this signal.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let len_before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != len_before
    }

    pub fn is_connected(&self, id: HandlerId) -> bool {
        self.handlers.borrow().iter().any(|(handler_id, _)| *handler_id == id)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Call every handler in connection order.
    ///
    /// The handler list is snapshotted before dispatch, so handlers may connect or disconnect
    /// (themselves or others) while the signal is being emitted. A handler disconnected during
    /// emission is not called anymore, a handler connected during emission is called on the
    /// next emission only.
    pub fn emit(&self, args: &A) {
        let snapshot = self.handlers.borrow().clone();
        for (id, handler) in snapshot {
            if self.is_connected(id) {
                handler(args);
            }
        }
    }
}
