use std::{cell::Cell, rc::Rc};

use assert_call::{call, CallRecorder};

use super::*;

struct TestTarget {
    id: Cell<Option<ComponentId>>,
    connected: Cell<bool>,
    requeue: Cell<bool>,
}
impl TestTarget {
    fn new() -> Rc<Self> {
        let this = Rc::new(Self {
            id: Cell::new(None),
            connected: Cell::new(true),
            requeue: Cell::new(false),
        });
        let target: Rc<dyn UpdateTarget> = this.clone();
        this.id.set(Some(register_component(Rc::downgrade(&target))));
        this
    }
}
impl UpdateTarget for TestTarget {
    fn id(&self) -> ComponentId {
        self.id.get().expect("registered")
    }
    fn is_connected(&self) -> bool {
        self.connected.get()
    }
    fn render(self: Rc<Self>, cx: &mut RenderContext) {
        call!("render {}", cx.component());
        if self.requeue.take() {
            request_update(self.id());
        }
    }
}

#[test]
fn requests_collapse_into_one_pass() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let target = TestTarget::new();
    let id = target.id();
    request_update(id);
    request_update(id);
    rt.ac().nc().request_update(id);
    assert!(rt.has_pending());

    assert!(rt.run_frame());
    cr.verify(format!("render {id}"));
    assert!(!rt.has_pending());
    assert!(!rt.run_frame());
    cr.verify(());
    assert_eq!(rt.frame_count(), 2);
}

#[test]
fn scheduler_called_once_per_window() {
    let mut cr = CallRecorder::new();
    let mut rt = Runtime::with_scheduler(|| call!("frame"));
    let a = TestTarget::new();
    let b = TestTarget::new();
    request_update(a.id());
    request_update(b.id());
    request_update(a.id());
    cr.verify("frame");

    rt.run_frame();
    cr.verify([format!("render {}", a.id()), format!("render {}", b.id())]);

    request_update(b.id());
    cr.verify("frame");
}

#[test]
fn detached_target_is_skipped() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let target = TestTarget::new();
    target.connected.set(false);
    request_update(target.id());
    assert!(!rt.run_frame());
    cr.verify(());
}

#[test]
fn dropped_target_is_skipped() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let target = TestTarget::new();
    let id = target.id();
    request_update(id);
    drop(target);
    assert!(!rt.run_frame());
    cr.verify(());
}

#[test]
fn request_during_pass_runs_next_frame() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let target = TestTarget::new();
    let id = target.id();
    target.requeue.set(true);
    request_update(id);

    rt.run_frame();
    cr.verify(format!("render {id}"));
    assert!(rt.has_pending());

    rt.update();
    cr.verify(format!("render {id}"));
    assert!(!rt.has_pending());
}

#[test]
fn diagnostics() {
    let mut rt = Runtime::new();
    let target = TestTarget::new();
    let error = crate::Diagnostic::Binding {
        target: crate::template::NodePath::new([0]),
        sink: "text-content".into(),
        error: crate::EvalError::new("boom"),
    };
    rt.ac().rc(target.id()).report(error.clone());
    assert_eq!(rt.take_diagnostics(), [error]);
    assert!(rt.take_diagnostics().is_empty());
}

#[test]
#[should_panic]
fn second_runtime_panics() {
    let _rt = Runtime::new();
    let _rt2 = Runtime::new();
}
