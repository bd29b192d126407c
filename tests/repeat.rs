
use self::test_utils::*;
use relist::Value;

fn mounted() -> Mounted {
    Mounted::items(strs(&["4", "2", "3", "1"]))
}

#[test]
fn initial_items_list() {
    let m = mounted();
    assert_eq!(m.values(), ["4", "2", "3", "1"]);
    assert!(m.host.child(0).is_some_and(|n| n.is_comment()));
}

#[test]
fn initial_locals() {
    let m = mounted();
    let children = m.host.element_children();
    assert_own_locals(
        &children[0],
        &[
            ("number", 1.into()),
            ("first", true.into()),
            ("last", false.into()),
            ("odd", true.into()),
            ("even", false.into()),
            ("item", "4".into()),
            ("index", 0.into()),
            ("length", 4.into()),
            ("key", "0".into()),
        ],
    );
    assert_own_locals(
        &children[2],
        &[
            ("number", 2.into()),
            ("first", false.into()),
            ("last", false.into()),
            ("odd", false.into()),
            ("even", true.into()),
            ("item", "2".into()),
            ("index", 1.into()),
            ("length", 4.into()),
            ("key", "1".into()),
        ],
    );
}

#[test]
fn shift_item_locals() {
    let mut m = mounted();
    let before = m.value_nodes();
    m.vec("items").borrow_mut(m.rt.ac()).shift();
    m.rt.update();
    assert_eq!(m.value_nodes()[..], before[1..]);

    let children = m.host.element_children();
    assert_own_locals(
        &children[0],
        &[
            ("number", 1.into()),
            ("first", true.into()),
            ("last", false.into()),
            ("odd", true.into()),
            ("even", false.into()),
            ("item", "2".into()),
            ("index", 0.into()),
            ("length", 3.into()),
            ("key", "0".into()),
        ],
    );
    assert_own_locals(
        &children[2],
        &[
            ("number", 2.into()),
            ("first", false.into()),
            ("last", false.into()),
            ("odd", false.into()),
            ("even", true.into()),
            ("item", "3".into()),
            ("index", 1.into()),
            ("length", 3.into()),
            ("key", "1".into()),
        ],
    );
}

#[test]
fn pop_item() {
    let mut m = mounted();
    m.vec("items").borrow_mut(m.rt.ac()).pop();
    m.rt.update();
    assert_eq!(m.values(), ["4", "2", "3"]);
}

#[test]
fn shift_item() {
    let mut m = mounted();
    m.vec("items").borrow_mut(m.rt.ac()).shift();
    m.rt.update();
    assert_eq!(m.values(), ["2", "3", "1"]);
}

#[test]
fn unshift_item() {
    let mut m = mounted();
    let before = m.value_nodes();
    m.vec("items").borrow_mut(m.rt.ac()).unshift("6");
    m.rt.update();
    assert_eq!(m.values(), ["6", "4", "2", "3", "1"]);
    assert_eq!(m.value_nodes()[1..], before[..]);
}

#[test]
fn sort_items() {
    let mut m = mounted();
    m.vec("items").borrow_mut(m.rt.ac()).sort();
    m.rt.update();
    assert_eq!(m.values(), ["1", "2", "3", "4"]);
}

#[test]
fn replace_with_added_item() {
    let mut m = mounted();
    m.set("items", strs(&["2", "2", "1", "4"]));
    m.rt.update();
    assert_eq!(m.values(), ["2", "2", "1", "4"]);
}

#[test]
fn replace() {
    let mut m = mounted();
    let before = m.value_nodes();
    m.set("items", strs(&["2", "2", "1"]));
    m.rt.update();
    assert_eq!(m.values(), ["2", "2", "1"]);

    let after = m.value_nodes();
    assert_eq!(after[0], before[1]);
    assert_eq!(after[2], before[3]);
    assert!(!before.contains(&after[1]));
}

#[test]
fn empty_with_length() {
    let mut m = mounted();
    m.vec("items").borrow_mut(m.rt.ac()).set_len(0);
    m.rt.update();
    assert!(m.values().is_empty());
    assert_eq!(m.host.child_count(), 1);
}

#[test]
fn empty_with_new_instance() {
    let mut m = mounted();
    m.set("items", strs(&[]));
    m.rt.update();
    assert!(m.values().is_empty());
    assert_eq!(m.host.child_count(), 1);
}

#[test]
fn push_items() {
    let mut m = mounted();
    m.vec("items")
        .borrow_mut(m.rt.ac())
        .extend(["1", "2", "3"]);
    m.rt.update();
    assert_eq!(m.values(), ["4", "2", "3", "1", "1", "2", "3"]);
}

#[test]
fn multiple_stage_splice() {
    let mut m = mounted();
    let items = m.vec("items");
    items.borrow_mut(m.rt.ac()).extend(["1", "2", "3"]);
    m.rt.update();

    items.borrow_mut(m.rt.ac()).splice(3..5, []);
    m.rt.update();
    assert_eq!(m.values(), ["4", "2", "3", "2", "3"]);
}

#[test]
fn multiple_stage_sort() {
    let mut m = mounted();
    let items = m.vec("items");
    items.borrow_mut(m.rt.ac()).extend(["1", "2", "3"]);
    m.rt.update();

    items.borrow_mut(m.rt.ac()).sort();
    m.rt.update();
    assert_eq!(m.values(), ["1", "1", "2", "2", "3", "3", "4"]);
}

#[test]
fn mutations_in_one_window_render_once() {
    let mut m = mounted();
    let frames = m.frames.get();
    let passes = m.rt.frame_count();
    let items = m.vec("items");
    for i in 0..5 {
        items.borrow_mut(m.rt.ac()).push(i);
    }
    items.borrow_mut(m.rt.ac()).shift();
    assert_eq!(m.frames.get(), frames + 1);

    m.rt.update();
    assert_eq!(m.rt.frame_count(), passes + 1);
    assert_eq!(m.values(), ["2", "3", "1", "0", "1", "2", "3", "4"]);
}

#[test]
fn settled_frame_is_idempotent() {
    let mut m = mounted();
    let version = m.host.child_list_version();
    m.component.request_update();
    m.rt.update();
    assert_eq!(m.host.child_list_version(), version);
    assert_eq!(m.values(), ["4", "2", "3", "1"]);
}

#[test]
fn set_item() {
    let mut m = mounted();
    let before = m.value_nodes();
    m.vec("items").borrow_mut(m.rt.ac()).set(1, "7");
    m.rt.update();
    assert_eq!(m.values(), ["4", "7", "3", "1"]);
    let after = m.value_nodes();
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);
    assert_eq!(
        after[1].locals().get("item").cloned(),
        Some(Value::from("7"))
    );
}
