//! Component-local state and effects.
//!
//! Hook records are positional: the Nth [`use_state`] (or [`use_effect`])
//! call of a render reads the Nth record of the component's previous render.
//! While a component function runs, its records are collected in a render
//! frame installed in thread-local storage; the reconciler moves them onto
//! the component's work node once the function returns.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::element::{ComponentFn, Element, Props};
use crate::error::FiberError;
use crate::runtime::RuntimeHandle;
use crate::work::WorkId;
use crate::Key;

pub(crate) type InstanceId = usize;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

/// Identity of one mounted component across renders.
///
/// Work nodes are reallocated every pass; the instance is what setters hold
/// on to so an update is rooted at whichever node is committed when the
/// update runs.
pub(crate) struct Instance {
    id: InstanceId,
    component: &'static str,
    committed: Cell<Option<WorkId>>,
}

impl Instance {
    fn new(component: &'static str) -> Self {
        Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            component,
            committed: Cell::new(None),
        }
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn component(&self) -> &'static str {
        self.component
    }

    pub(crate) fn committed(&self) -> Option<WorkId> {
        self.committed.get()
    }

    pub(crate) fn set_committed(&self, node: Option<WorkId>) {
        self.committed.set(node);
    }
}

type Updater<T> = Rc<dyn Fn(&T) -> T>;

/// Updates enqueued against one state slot. Consecutive records of the slot
/// share the queue, so a setter from any render reaches the live slot.
struct UpdateQueue<T> {
    updates: RefCell<Vec<Updater<T>>>,
}

impl<T> UpdateQueue<T> {
    fn new() -> Self {
        Self {
            updates: RefCell::new(Vec::new()),
        }
    }

    fn snapshot(&self) -> Vec<Updater<T>> {
        self.updates.borrow().clone()
    }
}

trait PendingUpdates: Any {
    /// Drop the `count` oldest updates; they were folded into a committed value.
    fn drain(&self, count: usize);
    fn len(&self) -> usize;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: 'static> PendingUpdates for UpdateQueue<T> {
    fn drain(&self, count: usize) {
        let mut updates = self.updates.borrow_mut();
        let count = count.min(updates.len());
        updates.drain(..count);
    }

    fn len(&self) -> usize {
        self.updates.borrow().len()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

pub(crate) struct StateHook {
    value: Rc<dyn Any>,
    queue: Rc<dyn PendingUpdates>,
    /// Updates folded into `value` by this render; drained only on commit so
    /// an abandoned pass loses nothing.
    consumed: usize,
}

/// Handle returned by [`use_state`] for scheduling updates to its slot.
pub struct Setter<T> {
    queue: Rc<UpdateQueue<T>>,
    instance: Weak<Instance>,
    runtime: RuntimeHandle,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            instance: Weak::clone(&self.instance),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: 'static> Setter<T> {
    /// Replace the value on the next pass.
    pub fn set(&self, value: T)
    where
        T: Clone,
    {
        self.push(Rc::new(move |_: &T| value.clone()));
    }

    /// Derive the next value from the previous one. Updates enqueued before
    /// the next pass are applied in order, each seeing the previous result.
    pub fn update(&self, updater: impl Fn(&T) -> T + 'static) {
        self.push(Rc::new(updater));
    }

    /// Number of updates waiting for a pass to apply them.
    pub fn pending(&self) -> usize {
        self.queue.updates.borrow().len()
    }

    fn push(&self, updater: Updater<T>) {
        self.queue.updates.borrow_mut().push(updater);
        match self.instance.upgrade() {
            Some(instance) => self.runtime.request_component(&instance),
            None => log::debug!("ignoring state update for an unmounted component"),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("pending", &self.queue.updates.borrow().len())
            .field("mounted", &(self.instance.strong_count() > 0))
            .finish()
    }
}

/// Teardown returned by an effect.
#[derive(Default)]
pub struct Cleanup(Option<Box<dyn FnOnce()>>);

impl Cleanup {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }

    /// Returns whether there was anything to run.
    pub(crate) fn run(self) -> bool {
        match self.0 {
            Some(cleanup) => {
                cleanup();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cleanup").field(&self.0.is_some()).finish()
    }
}

/// Dependency list of an effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dependencies {
    /// No list: the effect runs after every render.
    Always,
    /// Hashed entries; an empty list runs the effect only on mount.
    Keys(Vec<Key>),
}

impl Dependencies {
    pub fn len(&self) -> usize {
        match self {
            Dependencies::Always => 0,
            Dependencies::Keys(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds [`Dependencies::Keys`] from values implementing `Hash`.
///
/// Only the 64-bit hash of each entry is kept. Two different values whose
/// hashes collide compare as unchanged, and the effect is skipped.
#[macro_export]
macro_rules! deps {
    () => {
        $crate::Dependencies::Keys(::std::vec::Vec::new())
    };
    ($($dep:expr),+ $(,)?) => {
        $crate::Dependencies::Keys(::std::vec![$($crate::hash::hash_one(&$dep)),+])
    };
}

pub(crate) struct EffectHook {
    effect: Option<Box<dyn FnOnce() -> Cleanup>>,
    deps: Dependencies,
    cleanup: Option<Cleanup>,
    pending: bool,
}

impl EffectHook {
    pub(crate) fn is_pending(&self) -> bool {
        self.pending
    }

    /// Effects with a non-empty key list are torn down on every update pass,
    /// whether or not they run again.
    pub(crate) fn cleans_up_on_update(&self) -> bool {
        matches!(&self.deps, Dependencies::Keys(keys) if !keys.is_empty())
    }

    /// Run the effect body if this render scheduled it.
    pub(crate) fn run(&mut self) -> bool {
        match self.effect.take() {
            Some(effect) if self.pending => {
                self.cleanup = Some(effect());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }

    pub(crate) fn adopt_cleanup(&mut self, cleanup: Option<Cleanup>) {
        self.cleanup = cleanup;
    }
}

pub(crate) struct ComponentHooks {
    pub(crate) instance: Rc<Instance>,
    pub(crate) states: Vec<StateHook>,
    pub(crate) effects: Vec<EffectHook>,
}

impl fmt::Debug for ComponentHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHooks")
            .field("component", &self.instance.component())
            .field("states", &self.states.len())
            .field("effects", &self.effects.len())
            .finish_non_exhaustive()
    }
}

impl ComponentHooks {
    pub(crate) fn drain_consumed_updates(&mut self) {
        for state in &mut self.states {
            state.queue.drain(state.consumed);
            state.consumed = 0;
        }
    }

    /// Updates still queued after this render's were folded in.
    pub(crate) fn has_unconsumed_updates(&self) -> bool {
        self.states
            .iter()
            .any(|state| state.queue.len() > state.consumed)
    }

    /// Run every stored cleanup; used when the component unmounts.
    pub(crate) fn unmount(&mut self) -> usize {
        self.instance.set_committed(None);
        let mut ran = 0;
        for effect in &mut self.effects {
            if effect.take_cleanup().is_some_and(Cleanup::run) {
                ran += 1;
            }
        }
        ran
    }
}

struct RenderFrame {
    component: &'static str,
    runtime: RuntimeHandle,
    instance: Rc<Instance>,
    first_render: bool,
    previous_states: Vec<(Rc<dyn Any>, Rc<dyn PendingUpdates>)>,
    previous_deps: Vec<Dependencies>,
    states: Vec<StateHook>,
    effects: Vec<EffectHook>,
    error: Option<FiberError>,
}

impl RenderFrame {
    fn new(
        component: &'static str,
        runtime: RuntimeHandle,
        previous: Option<&ComponentHooks>,
    ) -> Self {
        let (instance, previous_states, previous_deps) = match previous {
            Some(hooks) => (
                Rc::clone(&hooks.instance),
                hooks
                    .states
                    .iter()
                    .map(|state| (Rc::clone(&state.value), Rc::clone(&state.queue)))
                    .collect(),
                hooks.effects.iter().map(|effect| effect.deps.clone()).collect(),
            ),
            None => (Rc::new(Instance::new(component)), Vec::new(), Vec::new()),
        };
        Self {
            component,
            runtime,
            instance,
            first_render: previous.is_none(),
            previous_states,
            previous_deps,
            states: Vec::new(),
            effects: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: FiberError) {
        self.error.get_or_insert(error);
    }

    fn finish(self) -> Result<ComponentHooks, FiberError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(ComponentHooks {
            instance: self.instance,
            states: self.states,
            effects: self.effects,
        })
    }
}

thread_local! {
    static CURRENT_FRAME: RefCell<Option<RenderFrame>> = const { RefCell::new(None) };
}

fn with_frame<R>(f: impl FnOnce(&mut RenderFrame) -> R) -> R {
    CURRENT_FRAME.with(|slot| {
        let mut slot = slot.borrow_mut();
        let frame = slot
            .as_mut()
            .expect("hooks may only be called while a component renders");
        f(frame)
    })
}

/// Call `component` with a render frame installed and collect its hooks.
pub(crate) fn render_component(
    component: ComponentFn,
    props: &Props,
    runtime: RuntimeHandle,
    previous: Option<&ComponentHooks>,
) -> Result<(Element, ComponentHooks), FiberError> {
    struct Restore(Option<RenderFrame>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let outer = self.0.take();
            CURRENT_FRAME.with(|slot| *slot.borrow_mut() = outer);
        }
    }

    let frame = RenderFrame::new(component.name(), runtime, previous);
    let restore = Restore(CURRENT_FRAME.with(|slot| slot.replace(Some(frame))));
    let element = component.call(props);
    let frame = CURRENT_FRAME
        .with(|slot| slot.borrow_mut().take())
        .expect("render frame removed while the component was rendering");
    drop(restore);
    frame.finish().map(|hooks| (element, hooks))
}

/// Persistent local state for the rendering component.
///
/// Returns the current value and a [`Setter`]. `initial` is only used the
/// first time the slot is evaluated.
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, Setter<T>) {
    let (slot, previous, runtime, instance, component) = with_frame(|frame| {
        let slot = frame.states.len();
        (
            slot,
            frame.previous_states.get(slot).cloned(),
            frame.runtime.clone(),
            Rc::downgrade(&frame.instance),
            frame.component,
        )
    });

    let mut mismatch = false;
    let (value, queue, consumed) = match previous {
        Some((base, queue)) => match (
            base.downcast::<T>(),
            queue.into_any().downcast::<UpdateQueue<T>>(),
        ) {
            (Ok(base), Ok(queue)) => {
                // Updaters run outside the frame borrow; they are user code.
                let updates = queue.snapshot();
                let value = updates
                    .iter()
                    .fold(T::clone(&base), |value, updater| updater(&value));
                (value, queue, updates.len())
            }
            _ => {
                mismatch = true;
                (initial, Rc::new(UpdateQueue::new()), 0)
            }
        },
        None => (initial, Rc::new(UpdateQueue::new()), 0),
    };

    with_frame(|frame| {
        if mismatch {
            frame.fail(FiberError::StateType {
                component,
                slot,
                expected: type_name::<T>(),
            });
        }
        frame.states.push(StateHook {
            value: Rc::new(value.clone()),
            queue: Rc::clone(&queue) as Rc<dyn PendingUpdates>,
            consumed,
        });
    });

    (
        value,
        Setter {
            queue,
            instance,
            runtime,
        },
    )
}

/// Run `effect` after the pass that rendered this component commits.
///
/// On the first render every effect runs. Afterwards an effect runs again
/// when `deps` is [`Dependencies::Always`] or when a non-empty key list has
/// an entry that differs from the previous render's. The previous run's
/// cleanup is invoked before the effect re-runs, and on unmount.
pub fn use_effect(effect: impl FnOnce() -> Cleanup + 'static, deps: Dependencies) {
    with_frame(|frame| {
        let slot = frame.effects.len();
        let pending = if frame.first_render {
            true
        } else {
            match (frame.previous_deps.get(slot).cloned(), &deps) {
                (_, Dependencies::Always) => true,
                (Some(Dependencies::Keys(ref previous)), Dependencies::Keys(current)) => {
                    if previous.len() == current.len() {
                        !current.is_empty() && previous.iter().zip(current).any(|(a, b)| a != b)
                    } else {
                        let error = FiberError::DependencyLength {
                            component: frame.component,
                            slot,
                            previous: previous.len(),
                            current: current.len(),
                        };
                        frame.fail(error);
                        false
                    }
                }
                (Some(Dependencies::Always) | None, Dependencies::Keys(_)) => true,
            }
        };
        frame.effects.push(EffectHook {
            effect: Some(Box::new(effect)),
            deps,
            cleanup: None,
            pending,
        });
    });
}

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod tests;
