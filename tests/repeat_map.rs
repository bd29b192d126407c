
use self::test_utils::*;
use relist::Value;

fn mounted() -> Mounted {
    Mounted::items(strs_map(&[("a", "a"), ("c", "c"), ("b", "b")]))
}

#[test]
fn initial_items_list() {
    let m = mounted();
    assert_eq!(m.values(), ["a", "c", "b"]);
}

#[test]
fn initial_locals() {
    let m = mounted();
    let nodes = m.value_nodes();
    assert_own_locals(
        &nodes[0],
        &[
            ("number", 1.into()),
            ("first", true.into()),
            ("last", false.into()),
            ("odd", true.into()),
            ("even", false.into()),
            ("item", "a".into()),
            ("index", 0.into()),
            ("length", 3.into()),
            ("key", "a".into()),
        ],
    );
    assert_own_locals(
        &nodes[1],
        &[
            ("number", 2.into()),
            ("first", false.into()),
            ("last", false.into()),
            ("odd", false.into()),
            ("even", true.into()),
            ("item", "c".into()),
            ("index", 1.into()),
            ("length", 3.into()),
            ("key", "c".into()),
        ],
    );
}

#[test]
fn delete_property() {
    let mut m = mounted();
    m.map("items").borrow_mut(m.rt.ac()).remove("c");
    m.rt.update();
    assert_eq!(m.values(), ["a", "b"]);
    assert_eq!(
        m.value_nodes()[1].locals().get("index"),
        Some(&Value::Int(1))
    );
}

#[test]
fn added_property() {
    let mut m = mounted();
    m.map("items")
        .borrow_mut(m.rt.ac())
        .insert("newProperty", "test");
    m.rt.update();
    assert_eq!(m.values(), ["a", "c", "b", "test"]);
    assert_eq!(
        m.value_nodes()[3].locals().get("key"),
        Some(&Value::from("newProperty"))
    );
}

#[test]
fn replace_the_same() {
    let mut m = mounted();
    let before = m.value_nodes();
    let version = m.host.child_list_version();
    m.set("items", strs_map(&[("a", "a"), ("c", "c"), ("b", "b")]));
    m.rt.update();
    assert_eq!(m.values(), ["a", "c", "b"]);
    assert_eq!(m.value_nodes(), before);
    assert_eq!(m.host.child_list_version(), version);
}

#[test]
fn replace_without_property() {
    let mut m = mounted();
    m.set("items", strs_map(&[("a", "a"), ("b", "b")]));
    m.rt.update();
    assert_eq!(m.values(), ["a", "b"]);
}

#[test]
fn overwrite_keeps_record() {
    let mut m = mounted();
    let before = m.value_nodes();
    m.map("items").borrow_mut(m.rt.ac()).insert("c", "C");
    m.rt.update();
    assert_eq!(m.values(), ["a", "C", "b"]);
    assert_eq!(m.value_nodes(), before);
}

#[test]
fn reordered_keys_move_records() {
    let mut m = mounted();
    let before = m.value_nodes();
    m.set("items", strs_map(&[("b", "b"), ("a", "a"), ("c", "c")]));
    m.rt.update();
    assert_eq!(m.values(), ["b", "a", "c"]);
    assert_eq!(m.value_nodes(), [before[2].clone(), before[0].clone(), before[1].clone()]);
}

#[test]
fn sequence_to_map_resyncs() {
    let mut m = Mounted::items(strs(&["a", "c", "b"]));
    let before = m.value_nodes();
    m.set("items", strs_map(&[("a", "a"), ("c", "c"), ("b", "b")]));
    m.rt.update();
    assert_eq!(m.values(), ["a", "c", "b"]);
    assert!(m.value_nodes().iter().all(|n| !before.contains(n)));
}
