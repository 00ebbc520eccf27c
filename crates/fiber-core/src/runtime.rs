use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::collections::HashSet;
use crate::hooks::{Instance, InstanceId};
use crate::platform::IdleScheduler;

/// What a queued pass renders.
#[derive(Clone)]
pub(crate) enum RenderRequest {
    /// Re-render the root's element into its container.
    Root,
    /// Re-render one component from its committed position.
    Component {
        id: InstanceId,
        instance: Weak<Instance>,
    },
}

impl RenderRequest {
    fn key(&self) -> RequestKey {
        match self {
            RenderRequest::Root => RequestKey::Root,
            RenderRequest::Component { id, .. } => RequestKey::Component(*id),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum RequestKey {
    Root,
    Component(InstanceId),
}

struct QueuedRequest {
    request: RenderRequest,
    /// Requests made outside a slice replace an uncommitted pass; requests
    /// made while rendering or committing wait for the next pass.
    supersedes: bool,
}

struct RuntimeInner {
    scheduler: Arc<dyn IdleScheduler>,
    requests: RefCell<VecDeque<QueuedRequest>>,
    queued: RefCell<HashSet<RequestKey>>,
    in_slice: Cell<bool>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn IdleScheduler>) -> Self {
        Self {
            scheduler,
            requests: RefCell::new(VecDeque::new()),
            queued: RefCell::new(HashSet::new()),
            in_slice: Cell::new(false),
        }
    }

    fn schedule(&self) {
        self.scheduler.request_idle_slice();
    }

    fn enqueue(&self, request: RenderRequest) {
        let supersedes = !self.in_slice.get();
        let key = request.key();
        if self.queued.borrow_mut().insert(key) {
            self.requests.borrow_mut().push_back(QueuedRequest {
                request,
                supersedes,
            });
        } else if supersedes {
            if let Some(existing) = self
                .requests
                .borrow_mut()
                .iter_mut()
                .find(|queued| queued.request.key() == key)
            {
                existing.supersedes = true;
            }
        }
        self.schedule();
    }

    fn requeue(&self, request: RenderRequest) {
        if self.queued.borrow_mut().insert(request.key()) {
            self.requests.borrow_mut().push_back(QueuedRequest {
                request,
                supersedes: false,
            });
        }
    }

    fn take_next(&self) -> Option<RenderRequest> {
        let queued = self.requests.borrow_mut().pop_front()?;
        self.queued.borrow_mut().remove(&queued.request.key());
        Some(queued.request)
    }
}

/// Shared request queue of a [`FiberRoot`](crate::FiberRoot).
///
/// The root owns the runtime; setters hold a [`RuntimeHandle`] that stops
/// doing anything once the root is dropped.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn IdleScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_requests(&self) -> bool {
        !self.inner.requests.borrow().is_empty()
    }

    pub fn request_idle_slice(&self) {
        self.inner.schedule();
    }

    /// Whether a request arrived from outside a slice since the last call.
    /// Clears the flag on every queued request.
    pub(crate) fn take_superseding(&self) -> bool {
        let mut superseding = false;
        for queued in self.inner.requests.borrow_mut().iter_mut() {
            superseding |= std::mem::take(&mut queued.supersedes);
        }
        superseding
    }

    pub(crate) fn request_root(&self) {
        self.inner.enqueue(RenderRequest::Root);
    }

    pub(crate) fn requeue(&self, request: RenderRequest) {
        self.inner.requeue(request);
    }

    pub(crate) fn take_next(&self) -> Option<RenderRequest> {
        self.inner.take_next()
    }

    pub(crate) fn set_in_slice(&self, in_slice: bool) {
        self.inner.in_slice.set(in_slice);
    }
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn request_idle_slice(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    pub(crate) fn request_component(&self, instance: &Rc<Instance>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue(RenderRequest::Component {
                id: instance.id(),
                instance: Rc::downgrade(instance),
            });
        }
    }
}
