use super::*;
use crate::{
    core::Runtime,
    template::{Expr, NodePath, RepeatOptions, Sink, Template},
    StateMap, StateVec,
};

const COMPONENT: ComponentId = ComponentId(0);

struct Fixture {
    rt: Runtime,
    host: Node,
    repeat: Repeat,
}

impl Fixture {
    fn new() -> Self {
        let template = Template::builder([Node::element("div").with_attribute("data-value", "")])
            .bind([0], Sink::TextContent, Expr::local("item"))
            .build()
            .unwrap();
        let anchor = Node::comment("for");
        let host = Node::element("host").with_child(anchor.clone());
        let block = RepeatBlock {
            anchor: NodePath::new([0]),
            source: Expr::local("items"),
            options: RepeatOptions::new(),
            template,
        };
        Self {
            rt: Runtime::new(),
            host,
            repeat: Repeat::new(block, anchor),
        }
    }
    fn refresh(&mut self, items: impl Into<Value>, changed: Changed) {
        let locals = Locals::from_entries([("items", items.into())]);
        self.repeat
            .refresh(&locals, &changed, &mut self.rt.ac().rc(COMPONENT));
    }
    fn texts(&self) -> Vec<String> {
        self.host
            .query_all(|n| n.has_attribute("data-value"))
            .iter()
            .map(Node::text_content)
            .collect()
    }
    fn nodes(&self) -> Vec<Node> {
        self.host.query_all(|n| n.has_attribute("data-value"))
    }
}

fn vec(items: &[&str]) -> StateVec {
    items.iter().copied().collect()
}

#[test]
fn renders_after_anchor() {
    let mut f = Fixture::new();
    f.refresh(vec(&["4", "2", "3", "1"]), Changed::All);
    assert_eq!(f.texts(), ["4", "2", "3", "1"]);
    assert!(f.host.child(0).is_some_and(|n| n.is_comment()));
    assert_eq!(f.repeat.len(), 4);
}

#[test]
fn stamps_item_locals() {
    let mut f = Fixture::new();
    f.refresh(vec(&["4", "2"]), Changed::All);
    let nodes = f.nodes();
    let locals = nodes[1].locals();
    assert_eq!(locals.get("item"), Some(&Value::from("2")));
    assert_eq!(locals.get("index"), Some(&Value::Int(1)));
    assert_eq!(locals.get("key"), Some(&Value::from("1")));
    assert_eq!(locals.get("last"), Some(&Value::Bool(true)));
    assert!(locals.get("items").is_some());
}

#[test]
fn duplicates_first_unmatched_wins() {
    let mut f = Fixture::new();
    let items = vec(&["x", "y", "x"]);
    f.refresh(items.clone(), Changed::All);
    let before = f.nodes();

    items.borrow_mut(f.rt.ac()).shift();
    f.refresh(items, Changed::none());
    let after = f.nodes();
    assert_eq!(f.texts(), ["y", "x"]);
    assert_eq!(after, [before[1].clone(), before[0].clone()]);
    assert_eq!(before[2].parent(), None);
}

#[test]
fn idempotent_refresh() {
    let mut f = Fixture::new();
    let items = vec(&["a", "b"]);
    f.refresh(items.clone(), Changed::All);
    let version = f.host.child_list_version();
    let nodes = f.nodes();

    f.refresh(items.clone(), Changed::none());
    f.refresh(items, Changed::All);
    assert_eq!(f.host.child_list_version(), version);
    assert_eq!(f.nodes(), nodes);
}

#[test]
fn push_leaves_prefix_untouched() {
    let mut f = Fixture::new();
    let items = vec(&["4", "2", "3", "1"]);
    f.refresh(items.clone(), Changed::All);
    let version = f.host.child_list_version();
    let nodes = f.nodes();

    items.borrow_mut(f.rt.ac()).push("5");
    f.refresh(items, Changed::none());
    assert_eq!(f.host.child_list_version(), version + 1);
    assert_eq!(f.nodes()[..4], nodes[..]);
    assert_eq!(f.texts(), ["4", "2", "3", "1", "5"]);
}

#[test]
fn sort_moves_minimum() {
    let mut f = Fixture::new();
    let items = vec(&["4", "1", "2", "3"]);
    f.refresh(items.clone(), Changed::All);
    let version = f.host.child_list_version();

    items.borrow_mut(f.rt.ac()).sort();
    f.refresh(items, Changed::none());
    assert_eq!(f.texts(), ["1", "2", "3", "4"]);
    // "1", "2" and "3" stay, "4" is moved once: removed and inserted
    assert_eq!(f.host.child_list_version(), version + 2);
}

#[test]
fn kind_change_resyncs() {
    let mut f = Fixture::new();
    f.refresh(vec(&["a", "b"]), Changed::All);
    let before = f.nodes();

    let map: StateMap = [("a", "a"), ("b", "b")].into_iter().collect();
    f.refresh(map, Changed::All);
    assert_eq!(f.texts(), ["a", "b"]);
    assert!(f.nodes().iter().all(|n| !before.contains(n)));
    assert_eq!(f.repeat.collection().map(Collection::kind), Some(CollectionKind::KeyedMap));
}

#[test]
fn source_error_empties_region() {
    let mut f = Fixture::new();
    f.refresh(vec(&["a"]), Changed::All);
    f.refresh(Value::Int(1), Changed::All);
    assert!(f.texts().is_empty());
    assert!(matches!(
        &f.rt.take_diagnostics()[..],
        [Diagnostic::Region {
            error: Error::UnsupportedCollection("int"),
            ..
        }]
    ));

    f.refresh(Value::Int(2), Changed::none());
    assert!(f.rt.take_diagnostics().is_empty());

    f.refresh(vec(&["b"]), Changed::All);
    assert_eq!(f.texts(), ["b"]);
}

#[test]
fn destroy_unbinds() {
    let mut f = Fixture::new();
    let items = vec(&["a", "b"]);
    f.refresh(items.clone(), Changed::All);
    assert_eq!(items.listener_count(), 1);

    f.repeat.destroy();
    assert_eq!(items.listener_count(), 0);
    assert!(f.texts().is_empty());
    assert!(f.repeat.is_destroyed());

    f.repeat.destroy();
    f.refresh(items, Changed::All);
    assert!(f.texts().is_empty());
}
