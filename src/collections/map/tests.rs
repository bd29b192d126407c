use std::rc::Rc;

use assert_call::{call, CallRecorder};

use super::*;
use crate::{
    collections::{CollectionBinding, Snapshot},
    core::Runtime,
    Collection,
};

struct TestSink;
impl CollectionSink for TestSink {
    fn notify(self: Rc<Self>, _nc: &mut NotifyContext) {
        call!("notify");
    }
}

fn bind(map: &StateMap) -> (Rc<TestSink>, CollectionBinding) {
    let sink = Rc::new(TestSink);
    let target: Rc<dyn CollectionSink> = sink.clone();
    (sink, Collection::Map(map.clone()).bind(Rc::downgrade(&target)))
}

fn keys(map: &StateMap) -> Vec<String> {
    map.keys().iter().map(|key| key.to_string()).collect()
}

#[test]
fn insertion_order() {
    let mut rt = Runtime::new();
    let map: StateMap = [("a", "a"), ("c", "c"), ("b", "b")].into_iter().collect();
    assert_eq!(keys(&map), ["a", "c", "b"]);

    {
        let mut entries = map.borrow_mut(rt.ac());
        entries.insert("c", "C");
        entries.insert("d", "d");
    }
    assert_eq!(keys(&map), ["a", "c", "b", "d"]);
    assert_eq!(map.get("c"), Some(Value::from("C")));

    map.borrow_mut(rt.ac()).remove("c");
    assert_eq!(keys(&map), ["a", "b", "d"]);

    map.borrow_mut(rt.ac()).retain(|key, _| key != "b");
    assert_eq!(keys(&map), ["a", "d"]);
}

#[test]
fn notify_per_mutating_borrow() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let map = StateMap::new();
    let (_sink, binding) = bind(&map);

    map.borrow_mut(rt.ac()).insert("a", 1);
    map.borrow_mut(rt.ac()).insert("b", 2);
    cr.verify(["notify", "notify"]);

    let Snapshot::KeyedMap(entries) = binding.read() else {
        panic!("expected keyed map");
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(&*entries[1].0, "b");
    assert!(!binding.take_dirty());

    map.borrow_mut(rt.ac()).remove("missing");
    map.borrow_mut(rt.ac()).retain(|_, _| true);
    cr.verify(());
    assert!(!binding.take_dirty());

    map.borrow_mut(rt.ac()).clear();
    cr.verify("notify");
    assert!(binding.take_dirty());
}

#[test]
fn serde_json() {
    let map: StateMap = serde_json::from_str(r#"{"a":"a","c":"c","b":"b"}"#).unwrap();
    assert_eq!(keys(&map), ["a", "c", "b"]);
    assert_eq!(
        serde_json::to_string(&map).unwrap(),
        r#"{"a":"a","c":"c","b":"b"}"#
    );
}
