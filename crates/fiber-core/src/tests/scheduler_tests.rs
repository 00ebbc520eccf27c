use super::*;
use crate::element::{h, AttrValue, Listener};
use crate::error::HostError;
use crate::hooks::{use_effect, use_state, Cleanup, Setter};
use crate::host::{HostKind, MemoryHost};
use crate::platform::StepBudget;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct CountingScheduler {
    requests: AtomicUsize,
}

impl CountingScheduler {
    fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl IdleScheduler for CountingScheduler {
    fn request_idle_slice(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

thread_local! {
    static COUNTER: RefCell<Option<Setter<i64>>> = const { RefCell::new(None) };
    static COUNTER_RENDERS: Cell<usize> = const { Cell::new(0) };
    static PARENT_RENDERS: Cell<usize> = const { Cell::new(0) };
    static EFFECT_UPDATES: Cell<usize> = const { Cell::new(0) };
}

fn counter(_: &Props) -> Element {
    COUNTER_RENDERS.with(|renders| renders.set(renders.get() + 1));
    let (count, set_count) = use_state(0i64);
    COUNTER.with(|slot| *slot.borrow_mut() = Some(set_count));
    h("span").attr("id", "count").child(count)
}

fn parent(_: &Props) -> Element {
    PARENT_RENDERS.with(|renders| renders.set(renders.get() + 1));
    h("div")
        .child(h("p").child("before"))
        .child(h(crate::component!(counter)))
        .child(h("p").child("after"))
}

/// Bumps its own state from an effect until it reaches 3.
fn self_updating(_: &Props) -> Element {
    let (count, set_count) = use_state(0i64);
    use_effect(
        move || {
            if count < 3 {
                EFFECT_UPDATES.with(|updates| updates.set(updates.get() + 1));
                set_count.update(|count| count + 1);
            }
            Cleanup::none()
        },
        crate::deps![count],
    );
    h("b").child(count)
}

fn counter_setter() -> Setter<i64> {
    COUNTER
        .with(|slot| slot.borrow().clone())
        .expect("counter mounted")
}

fn setup() -> (FiberRoot<MemoryHost>, HostHandle, Arc<CountingScheduler>) {
    let scheduler = Arc::new(CountingScheduler::default());
    let mut host = MemoryHost::new();
    let container = host.create_container("root");
    let root = FiberRoot::with_scheduler(host, scheduler.clone());
    (root, container, scheduler)
}

#[test]
fn render_only_queues_work() {
    let (mut root, container, scheduler) = setup();
    root.render(h("div"), container);

    assert_eq!(scheduler.count(), 1);
    assert!(!root.is_idle());
    assert!(root.host().ops().is_empty());
    assert_eq!(root.current_root(), None);

    let commits = root.run_until_idle().unwrap();
    assert_eq!(commits.len(), 1);
    assert!(root.is_idle());
    assert_eq!(root.host().children(container).len(), 1);
}

#[test]
fn slices_yield_and_rerequest_until_the_pass_commits() {
    let (mut root, container, scheduler) = setup();
    root.render(
        h("ul").children((0..4).map(|i| h("li").child(i))),
        container,
    );

    let mut slices = 0;
    loop {
        slices += 1;
        let outcome = root.run_slice(&mut StepBudget::new(3)).unwrap();
        if outcome.committed() {
            assert!(!outcome.yielded);
            break;
        }
        assert!(outcome.yielded);
        assert!(root.host().children(container).is_empty());
    }

    // root, ul, four li and four text nodes: ten units in slices of three.
    assert_eq!(slices, 4);
    assert_eq!(scheduler.count(), 1 + 3);
    assert_eq!(root.host().text_content(container), "0123");
}

#[test]
fn closure_deadlines_drive_the_yield_threshold() {
    let (mut root, container, _) = setup();
    root = root.with_config(FiberConfig::default().with_yield_threshold(Duration::from_millis(5)));
    root.render(h("div").child(h("p")), container);

    let mut remaining = Duration::from_millis(6);
    let outcome = root
        .run_slice(&mut || {
            remaining = remaining.saturating_sub(Duration::from_millis(1));
            remaining
        })
        .unwrap();

    // 5ms left after the first unit, 4ms after the second.
    assert!(outcome.yielded);
    assert_eq!(root.tree().len(), 3);
}

#[test]
fn an_outside_request_supersedes_the_pass_in_progress() {
    let (mut root, container, _) = setup();
    root.render(h("div").child(h("p").child("old")), container);
    root.run_slice(&mut StepBudget::new(2)).unwrap();
    assert!(root.in_progress_root().is_some());

    root.render(h("div").child(h("p").child("new")), container);
    let commits = root.run_until_idle().unwrap();

    // The newer root request already covers the abandoned one.
    assert_eq!(commits.len(), 1);
    assert_eq!(root.host().text_content(container), "new");
    let current = root.current_root().unwrap();
    assert_eq!(root.tree().len(), root.tree().subtree(current).count());
}

#[test]
fn state_updates_accumulate_then_replace() {
    let (mut root, container, _) = setup();
    root.render(h(crate::component!(counter)), container);
    root.run_until_idle().unwrap();
    assert_eq!(root.host().text_content(container), "0");

    let setter = counter_setter();
    setter.update(|count| count + 1);
    setter.update(|count| count + 1);
    setter.update(|count| count + 1);
    let commits = root.run_until_idle().unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(root.host().text_content(container), "3");
    assert_eq!(setter.pending(), 0);

    setter.set(5);
    root.run_until_idle().unwrap();
    assert_eq!(root.host().text_content(container), "5");
}

#[test]
fn component_updates_only_rerender_that_component() {
    let (mut root, container, _) = setup();
    COUNTER_RENDERS.with(|renders| renders.set(0));
    PARENT_RENDERS.with(|renders| renders.set(0));
    root.render(h(crate::component!(parent)), container);
    root.run_until_idle().unwrap();
    root.host_mut().take_ops();

    counter_setter().set(7);
    root.run_slice(&mut StepBudget::new(1)).unwrap();
    let pass = root.in_progress_root().unwrap();
    assert!(root.tree().get(pass).unwrap().kind().is_component());
    root.run_until_idle().unwrap();

    assert_eq!(PARENT_RENDERS.with(Cell::get), 1);
    assert_eq!(COUNTER_RENDERS.with(Cell::get), 2);
    assert_eq!(root.host().text_content(container), "before7after");
    assert_eq!(
        root.host()
            .ops()
            .iter()
            .filter(|op| op.is_mutation())
            .count(),
        1,
        "{:?}",
        root.host().ops()
    );

    // The spliced node is reachable from the committed root.
    let current = root.current_root().unwrap();
    let live: Vec<WorkId> = root.tree().subtree(current).collect();
    assert_eq!(live.len(), root.tree().len());

    counter_setter().update(|count| count * 2);
    root.run_until_idle().unwrap();
    assert_eq!(root.host().text_content(container), "before14after");
}

#[test]
fn superseded_component_passes_lose_no_updates() {
    let (mut root, container, _) = setup();
    root.render(h("div").child(h(crate::component!(counter))), container);
    root.run_until_idle().unwrap();

    let setter = counter_setter();
    setter.update(|count| count + 1);
    root.run_slice(&mut StepBudget::new(1)).unwrap();
    assert!(root.in_progress_root().is_some());

    setter.update(|count| count + 1);
    let commits = root.run_until_idle().unwrap();

    assert_eq!(commits.len(), 1);
    assert_eq!(root.host().text_content(container), "2");
}

#[test]
fn requests_from_effects_run_after_the_commit() {
    let (mut root, container, _) = setup();
    EFFECT_UPDATES.with(|updates| updates.set(0));
    root.render(h(crate::component!(self_updating)), container);

    let outcome = root.run_slice(&mut Unbounded).unwrap();

    assert_eq!(outcome.commits.len(), 4);
    assert_eq!(EFFECT_UPDATES.with(Cell::get), 3);
    assert_eq!(root.host().text_content(container), "3");
    assert!(root.is_idle());
}

#[test]
fn update_rerenders_the_last_element() {
    let (mut root, container, _) = setup();
    root.update();
    assert!(root.is_idle());

    root.render(h(crate::component!(counter)), container);
    root.run_until_idle().unwrap();
    COUNTER_RENDERS.with(|renders| renders.set(0));

    root.update();
    let commits = root.run_until_idle().unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(COUNTER_RENDERS.with(Cell::get), 1);
}

#[test]
fn updates_to_unmounted_components_are_dropped() {
    let (mut root, container, _) = setup();
    let tree = |show: bool| h("div").child(show.then(|| h(crate::component!(counter))));
    root.render(tree(true), container);
    root.run_until_idle().unwrap();
    let setter = counter_setter();
    COUNTER.with(|slot| slot.borrow_mut().take());

    root.render(tree(false), container);
    root.run_until_idle().unwrap();

    setter.set(9);
    assert!(root.is_idle());
    assert_eq!(root.host().text_content(container), "");
}

#[test]
fn rendering_into_another_container_moves_the_tree() {
    let (mut root, first, _) = setup();
    let second = root.host_mut().create_container("other");
    root.render(h("p").child("x"), first);
    root.run_until_idle().unwrap();

    root.render(h("p").child("x"), second);
    root.run_until_idle().unwrap();

    assert!(root.host().children(first).is_empty());
    assert_eq!(root.host().text_content(second), "x");
    assert_eq!(root.container(), Some(second));
}

#[test]
fn listeners_rebind_across_renders() {
    let (mut root, container, _) = setup();
    let clicks = Rc::new(Cell::new(0));
    let button = |amount: i32| {
        let clicks = Rc::clone(&clicks);
        h("button")
            .attr("id", "go")
            .attr("onClick", Listener::new(move || clicks.set(clicks.get() + amount)))
    };
    root.render(button(1), container);
    root.run_until_idle().unwrap();
    let handle = root.host().find_by_attribute(container, "id", "go").unwrap();
    assert_eq!(root.host().dispatch(handle, "click"), 1);

    root.render(button(10), container);
    root.run_until_idle().unwrap();
    assert_eq!(root.host().dispatch(handle, "click"), 1);
    assert_eq!(clicks.get(), 11);
    assert_eq!(root.host().node(handle).unwrap().listener_count("click"), 1);
}

fn mismatched(_: &Props) -> Element {
    let (flag, _) = use_state(false);
    h("i").attr("flag", flag)
}

fn first_kind(props: &Props) -> Element {
    let component = if props.get("swap").is_some() {
        crate::component!(mismatched)
    } else {
        crate::component!(counter)
    };
    component.call(props)
}

#[test]
fn hook_errors_discard_the_pass() {
    let (mut root, container, _) = setup();
    root.render(h(crate::component!(first_kind)), container);
    root.run_until_idle().unwrap();
    let committed = root.current_root();

    root.render(h(crate::component!(first_kind)).attr("swap", true), container);
    let error = root.run_until_idle().unwrap_err();

    assert!(matches!(error, FiberError::StateType { slot: 0, .. }));
    assert_eq!(root.current_root(), committed);
    assert!(root.is_idle());
    assert_eq!(root.host().text_content(container), "0");
}

/// Delegates to a [`MemoryHost`] but refuses appends once armed.
#[derive(Default)]
struct RefusingHost {
    inner: MemoryHost,
    refuse_appends: bool,
}

impl Host for RefusingHost {
    fn create_node(&mut self, kind: HostKind<'_>) -> Result<HostHandle, HostError> {
        self.inner.create_node(kind)
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        if self.refuse_appends {
            return Err(HostError::Rejected {
                operation: "append_child",
                reason: "armed".to_owned(),
            });
        }
        self.inner.append_child(parent, child)
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        self.inner.remove_child(parent, child)
    }

    fn set_attribute(
        &mut self,
        handle: HostHandle,
        key: &str,
        value: &AttrValue,
    ) -> Result<(), HostError> {
        self.inner.set_attribute(handle, key, value)
    }

    fn remove_attribute(&mut self, handle: HostHandle, key: &str) -> Result<(), HostError> {
        self.inner.remove_attribute(handle, key)
    }

    fn add_event_listener(
        &mut self,
        handle: HostHandle,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        self.inner.add_event_listener(handle, event, listener)
    }

    fn remove_event_listener(
        &mut self,
        handle: HostHandle,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        self.inner.remove_event_listener(handle, event, listener)
    }
}

#[test]
fn host_errors_abort_the_commit() {
    let mut host = RefusingHost::default();
    let container = host.inner.create_container("root");
    let mut root = FiberRoot::new(host);
    root.render(h("div"), container);
    root.run_until_idle().unwrap();
    let committed = root.current_root();

    root.host_mut().refuse_appends = true;
    root.render(h("div").child(h("p")), container);
    let error = root.run_until_idle().unwrap_err();

    assert!(matches!(error, FiberError::Host(HostError::Rejected { .. })));
    assert_eq!(root.current_root(), committed);
    assert!(root.in_progress_root().is_none());
    let div = root.host().inner.children(container)[0];
    assert!(root.host().inner.children(div).is_empty());
}
