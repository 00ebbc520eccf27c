use super::*;
use crate::element::{
    create_element, create_text_element, h, AttrValue, Element, Listener, TEXT_VALUE,
};
use crate::hooks::{use_effect, Cleanup, Dependencies};
use crate::host::{HostOp, MemoryHost};
use std::cell::RefCell;

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log(entry: String) {
    LOG.with(|log| log.borrow_mut().push(entry));
}

fn take_log() -> Vec<String> {
    LOG.with(|log| log.borrow_mut().drain(..).collect())
}

fn label(props: &Props) -> String {
    props.get("label").map(ToString::to_string).unwrap_or_default()
}

fn ticker(props: &Props) -> Element {
    let x = props.get("x").and_then(AttrValue::as_int).unwrap_or_default();
    let label = label(props);
    use_effect(
        move || {
            log(format!("run {label}{x}"));
            Cleanup::new(move || log(format!("cleanup {label}{x}")))
        },
        crate::deps![x],
    );
    use_effect(
        || {
            log("mount".to_owned());
            Cleanup::new(|| log("unmount".to_owned()))
        },
        crate::deps![],
    );
    h("i")
}

fn heartbeat(props: &Props) -> Element {
    let n = props.get("n").and_then(AttrValue::as_int).unwrap_or_default();
    use_effect(
        move || {
            log(format!("beat {n}"));
            Cleanup::new(move || log(format!("stop {n}")))
        },
        Dependencies::Always,
    );
    h("b")
}

fn mount(element: Element) -> (FiberRoot<MemoryHost>, HostHandle, CommitReport) {
    let mut host = MemoryHost::new();
    let container = host.create_container("root");
    let mut root = FiberRoot::new(host);
    root.render(element, container);
    let mut reports = root.run_until_idle().unwrap();
    assert_eq!(reports.len(), 1);
    (root, container, reports.remove(0))
}

fn rerender(
    root: &mut FiberRoot<MemoryHost>,
    container: HostHandle,
    element: Element,
) -> CommitReport {
    root.host_mut().take_ops();
    root.render(element, container);
    let mut reports = root.run_until_idle().unwrap();
    assert_eq!(reports.len(), 1);
    reports.remove(0)
}

fn sample() -> Element {
    h("div")
        .attr("id", "main")
        .child(h("p").child("hello"))
        .child(h("span"))
}

fn appends(ops: &[HostOp]) -> Vec<(HostHandle, HostHandle)> {
    ops.iter()
        .filter_map(|op| match op {
            HostOp::Append { parent, child } => Some((*parent, *child)),
            _ => None,
        })
        .collect()
}

#[test]
fn first_render_builds_an_isomorphic_tree_in_depth_first_order() {
    let (root, container, report) = mount(sample());
    let host = root.host();

    let div = host.children(container)[0];
    let p = host.children(div)[0];
    let text = host.children(p)[0];
    let span = host.children(div)[1];
    assert_eq!(
        appends(host.ops()),
        vec![(container, div), (div, p), (p, text), (div, span)]
    );
    assert_eq!(
        host.dump_tree(container),
        "<root>\n  <div id=Str(\"main\")>\n    <p>\n      \"hello\"\n    <span>\n"
    );
    assert_eq!(report.placed, 4);
    assert_eq!(report.deleted, 0);
}

#[test]
fn rerendering_identical_input_issues_no_mutations() {
    let (mut root, container, _) = mount(sample());
    let report = rerender(&mut root, container, sample());

    assert!(root.host().ops().iter().all(|op| !op.is_mutation()), "{:?}", root.host().ops());
    assert!(root.host().ops().is_empty());
    assert_eq!(report, CommitReport::default());
}

#[test]
fn conditional_child_removal_deletes_only_that_child() {
    let tree = |show_first: bool| {
        h("div")
            .child(show_first.then(|| h("p")))
            .child(h("span").attr("class", "kept"))
    };
    let (mut root, container, _) = mount(tree(true));
    let div = root.host().children(container)[0];
    let p = root.host().children(div)[0];
    let span = root.host().children(div)[1];

    let report = rerender(&mut root, container, tree(false));

    assert_eq!(
        root.host().ops(),
        &[HostOp::Remove { parent: div, child: p }]
    );
    assert_eq!(root.host().children(div), &[span]);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.placed, 0);
}

#[test]
fn type_change_replaces_instead_of_updating() {
    let (mut root, container, _) = mount(h("div").child(h("p").attr("id", "x")));
    let div = root.host().children(container)[0];
    let p = root.host().children(div)[0];

    let report = rerender(&mut root, container, h("div").child(h("span").attr("id", "x")));

    let span = root.host().children(div)[0];
    assert_ne!(span, p);
    assert_eq!(root.host().node(span).unwrap().kind(), "span");
    assert_eq!(
        root.host().ops(),
        &[
            HostOp::Create {
                handle: span,
                kind: "span".to_owned()
            },
            HostOp::SetAttribute {
                handle: span,
                key: "id".to_owned(),
                value: AttrValue::from("x")
            },
            HostOp::Remove { parent: div, child: p },
            HostOp::Append {
                parent: div,
                child: span
            },
        ]
    );
    assert_eq!((report.placed, report.deleted, report.updated), (1, 1, 0));
}

#[test]
fn text_changes_update_the_existing_node() {
    let (mut root, container, _) = mount(h("p").child(1));
    let p = root.host().children(container)[0];
    let text = root.host().children(p)[0];

    let report = rerender(&mut root, container, h("p").child(2));

    assert_eq!(
        root.host().ops(),
        &[HostOp::SetAttribute {
            handle: text,
            key: TEXT_VALUE.to_owned(),
            value: AttrValue::Int(2)
        }]
    );
    assert_eq!(root.host().text_content(container), "2");
    assert_eq!(report.updated, 1);
}

#[test]
fn prop_diff_clears_removed_keys_and_rebinds_listeners() {
    let mut host = MemoryHost::new();
    let handle = host.create_container("button");
    let config = FiberConfig::default();
    let first = Listener::new(|| {});
    let second = Listener::new(|| {});
    let previous = Props::new()
        .with_attribute("onClick", first.clone())
        .with_attribute("title", "old")
        .with_attribute("tabindex", 1);
    let next = Props::new()
        .with_attribute("onClick", second.clone())
        .with_attribute("tabindex", 1)
        .with_attribute("class", "wide");

    diff_props(&mut host, handle, None, &previous, &config).unwrap();
    host.take_ops();
    let calls = diff_props(&mut host, handle, Some(&previous), &next, &config).unwrap();

    assert_eq!(calls, 4);
    assert_eq!(
        host.take_ops(),
        vec![
            HostOp::RemoveListener {
                handle,
                event: "click".to_owned()
            },
            HostOp::RemoveAttribute {
                handle,
                key: "title".to_owned()
            },
            HostOp::AddListener {
                handle,
                event: "click".to_owned()
            },
            HostOp::SetAttribute {
                handle,
                key: "class".to_owned(),
                value: AttrValue::from("wide")
            },
        ]
    );
    let node = host.node(handle).unwrap();
    assert_eq!(node.listener_count("click"), 1);
    assert!(node.attribute("title").is_none());
    assert!(node.attribute("onClick").is_none());
}

#[test]
fn effects_follow_their_dependencies_and_clean_up_on_unmount() {
    let tree = |show: bool, x: i64| {
        h("div").child(show.then(|| h(crate::component!(ticker)).attr("x", x)))
    };
    let (mut root, container, report) = mount(tree(true, 1));
    assert_eq!(take_log(), vec!["run 1", "mount"]);
    assert_eq!(report.effects_run, 2);

    // Keyed cleanups run on every update, even when the effect is skipped.
    let report = rerender(&mut root, container, tree(true, 1));
    assert_eq!(take_log(), vec!["cleanup 1"]);
    assert_eq!((report.effects_run, report.cleanups_run), (0, 1));

    let report = rerender(&mut root, container, tree(true, 2));
    assert_eq!(take_log(), vec!["run 2"]);
    assert_eq!((report.effects_run, report.cleanups_run), (1, 0));

    let report = rerender(&mut root, container, tree(false, 2));
    assert_eq!(take_log(), vec!["cleanup 2", "unmount"]);
    assert_eq!((report.cleanups_run, report.deleted), (2, 1));
}

#[test]
fn always_effects_rerun_every_commit_and_clean_up_only_on_unmount() {
    let tree = |show: bool, n: i64| {
        h("div").child(show.then(|| h(crate::component!(heartbeat)).attr("n", n)))
    };
    let (mut root, container, report) = mount(tree(true, 1));
    assert_eq!(take_log(), vec!["beat 1"]);
    assert_eq!(report.effects_run, 1);

    let report = rerender(&mut root, container, tree(true, 2));
    assert_eq!(take_log(), vec!["beat 2"]);
    assert_eq!((report.effects_run, report.cleanups_run), (1, 0));

    let report = rerender(&mut root, container, tree(true, 2));
    assert_eq!(take_log(), vec!["beat 2"]);
    assert_eq!((report.effects_run, report.cleanups_run), (1, 0));

    let report = rerender(&mut root, container, tree(false, 2));
    assert_eq!(take_log(), vec!["stop 2"]);
    assert_eq!((report.cleanups_run, report.deleted), (1, 1));
}

#[test]
fn every_old_cleanup_runs_before_any_new_effect() {
    let tree = |x: i64| {
        h("div")
            .child(h(crate::component!(ticker)).attr("label", "a").attr("x", x))
            .child(h("p").child(h(crate::component!(ticker)).attr("label", "b").attr("x", x)))
    };
    let (mut root, container, _) = mount(tree(1));
    assert_eq!(take_log(), vec!["run a1", "mount", "run b1", "mount"]);

    let report = rerender(&mut root, container, tree(2));
    assert_eq!(
        take_log(),
        vec!["cleanup a1", "cleanup b1", "run a2", "run b2"]
    );
    assert_eq!((report.effects_run, report.cleanups_run), (2, 2));

    let report = rerender(&mut root, container, h("div"));
    assert_eq!(
        take_log(),
        vec!["cleanup a2", "unmount", "cleanup b2", "unmount"]
    );
    assert_eq!((report.cleanups_run, report.deleted), (4, 2));
}

#[test]
fn commit_frees_replaced_nodes_and_clears_links() {
    let element = create_element("ul", [("role", "list")], [create_text_element("a"), h("li")]);
    let (mut root, container, _) = mount(element.clone());
    let live = root.tree().len();

    rerender(&mut root, container, element);

    assert_eq!(root.tree().len(), live);
    let current = root.current_root().unwrap();
    for id in root.tree().subtree(current) {
        let node = root.tree().get(id).unwrap();
        assert_eq!(node.previous(), None);
        assert_eq!(node.tag(), MutationTag::None);
    }
    assert_eq!(root.in_progress_root(), None);
}
