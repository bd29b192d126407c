use std::{
    cell::RefCell,
    mem::{replace, take, transmute},
    rc::{Rc, Weak},
    thread::AccessError,
};

use parse_display::Display;
use slabmap::SlabMap;

use crate::Diagnostic;

#[cfg(test)]
mod tests;

thread_local! {
    static GLOBALS: RefCell<Globals> = RefCell::new(Globals::new());
}

struct Globals {
    is_runtime_exists: bool,
    components: SlabMap<ComponentEntry>,
    updates: Vec<ComponentId>,
    scheduler: Option<Rc<dyn FrameScheduler>>,
    is_frame_requested: bool,
}
impl Globals {
    fn new() -> Self {
        Self {
            is_runtime_exists: false,
            components: SlabMap::new(),
            updates: Vec::new(),
            scheduler: None,
            is_frame_requested: false,
        }
    }
    fn with<T>(f: impl FnOnce(&mut Self) -> T) -> T {
        GLOBALS.with(|g| f(&mut g.borrow_mut()))
    }
    fn try_with<T>(f: impl FnOnce(&mut Self) -> T) -> Result<T, AccessError> {
        GLOBALS.try_with(|g| f(&mut g.borrow_mut()))
    }
    fn assert_exists(&self) {
        if !self.is_runtime_exists {
            panic!("`Runtime` is not created.");
        }
    }

    fn register(&mut self, target: Weak<dyn UpdateTarget>) -> ComponentId {
        self.assert_exists();
        ComponentId(self.components.insert(ComponentEntry {
            target,
            is_queued: false,
        }))
    }
    fn unregister(&mut self, id: ComponentId) {
        self.components.remove(id.0);
    }

    /// Queues `id` and returns the scheduler to wake if this is the first request of the frame.
    #[must_use]
    fn push_update(&mut self, id: ComponentId) -> Option<Rc<dyn FrameScheduler>> {
        let entry = self.components.get_mut(id.0)?;
        if replace(&mut entry.is_queued, true) {
            return None;
        }
        self.updates.push(id);
        if replace(&mut self.is_frame_requested, true) {
            return None;
        }
        self.scheduler.clone()
    }
    fn take_updates(&mut self, targets: &mut Vec<Rc<dyn UpdateTarget>>) {
        for id in self.updates.drain(..) {
            if let Some(entry) = self.components.get_mut(id.0) {
                entry.is_queued = false;
                if let Some(target) = entry.target.upgrade() {
                    targets.push(target);
                }
            }
        }
        self.is_frame_requested = false;
    }

    fn finish_runtime(&mut self) {
        self.is_runtime_exists = false;
        self.scheduler = None;
        self.updates.clear();
        self.is_frame_requested = false;
    }
}

struct ComponentEntry {
    target: Weak<dyn UpdateTarget>,
    is_queued: bool,
}

/// Identifier of a component registered in the render scheduler.
#[derive(Debug, Display, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[display("#{0}")]
pub struct ComponentId(pub(crate) usize);

/// Source of paint-aligned frames.
///
/// The runtime calls [`request_frame`](Self::request_frame) once per frame window, when the first update is queued.
/// The host answers by calling [`Runtime::run_frame`] on its next frame callback.
pub trait FrameScheduler: 'static {
    fn request_frame(&self);
}
impl<F: Fn() + 'static> FrameScheduler for F {
    fn request_frame(&self) {
        self()
    }
}

pub(crate) trait UpdateTarget: 'static {
    fn id(&self) -> ComponentId;
    fn is_connected(&self) -> bool;
    fn render(self: Rc<Self>, cx: &mut RenderContext);
}

pub(crate) fn register_component(target: Weak<dyn UpdateTarget>) -> ComponentId {
    Globals::with(|g| g.register(target))
}
pub(crate) fn unregister_component(id: ComponentId) {
    let _ = Globals::try_with(|g| g.unregister(id));
}

/// Requests a render pass for the component on the next frame.
///
/// Calls made before the frame runs collapse into one pass.
pub fn request_update(id: ComponentId) {
    let scheduler = Globals::try_with(|g| g.push_update(id)).ok().flatten();
    if let Some(scheduler) = scheduler {
        scheduler.request_frame();
    }
}

/// Render runtime.
pub struct Runtime {
    rt: RawRuntime,
    targets_buffer: Vec<Rc<dyn UpdateTarget>>,
}

impl Runtime {
    /// Create a runtime driven manually through [`run_frame`](Self::run_frame).
    pub fn new() -> Self {
        if Globals::with(|g| replace(&mut g.is_runtime_exists, true)) {
            panic!("Only one `Runtime` can exist in the same thread at the same time.");
        };
        Self {
            rt: RawRuntime::new(),
            targets_buffer: Vec::new(),
        }
    }

    /// Create a runtime that asks `scheduler` for a frame whenever an update is queued.
    pub fn with_scheduler(scheduler: impl FrameScheduler) -> Self {
        let this = Self::new();
        Globals::with(|g| g.scheduler = Some(Rc::new(scheduler)));
        this
    }

    pub fn ac(&mut self) -> &mut ActionContext {
        ActionContext::new(self)
    }

    /// Run one frame: one render pass for each component queued before this call.
    ///
    /// Components detached from the document are skipped.
    /// Updates requested during the frame are deferred to the next frame.
    ///
    /// Returns `true` if any render pass ran.
    pub fn run_frame(&mut self) -> bool {
        let mut targets = take(&mut self.targets_buffer);
        Globals::with(|g| g.take_updates(&mut targets));
        self.rt.frame_count += 1;
        tracing::trace!(
            frame = self.rt.frame_count,
            queued = targets.len(),
            "run frame"
        );
        let mut handled = false;
        for target in targets.drain(..) {
            if !target.is_connected() {
                tracing::trace!("skip render of detached component");
                continue;
            }
            target.clone().render(&mut self.rt.rc(target.id()));
            handled = true;
        }
        self.targets_buffer = targets;
        handled
    }

    /// Repeat [`run_frame`](Self::run_frame) until no update is queued.
    pub fn update(&mut self) {
        while self.has_pending() {
            self.run_frame();
        }
    }

    /// Returns `true` if an update is queued for the next frame.
    pub fn has_pending(&self) -> bool {
        Globals::with(|g| !g.updates.is_empty())
    }

    /// Number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.rt.frame_count
    }

    /// Take the transient errors reported by render passes since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        take(&mut self.rt.diagnostics)
    }
}
impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
impl Drop for Runtime {
    fn drop(&mut self) {
        let _ = Globals::try_with(|g| g.finish_runtime());
    }
}

pub(crate) struct RawRuntime {
    diagnostics: Vec<Diagnostic>,
    frame_count: u64,
}
impl RawRuntime {
    fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            frame_count: 0,
        }
    }
    fn rc(&mut self, component: ComponentId) -> RenderContext<'_> {
        RenderContext {
            rt: self,
            component,
        }
    }
}

/// Context of one render pass.
pub struct RenderContext<'a> {
    rt: &'a mut RawRuntime,
    component: ComponentId,
}

impl RenderContext<'_> {
    /// The component being rendered.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Report a transient error to the diagnostic channel without interrupting the pass.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(component = %self.component, %diagnostic, "render error");
        self.rt.diagnostics.push(diagnostic);
    }
}

/// Context for changing state.
#[repr(transparent)]
pub struct ActionContext(Runtime);

impl ActionContext {
    fn new(rt: &mut Runtime) -> &mut Self {
        unsafe { transmute(rt) }
    }
    pub fn nc(&mut self) -> &mut NotifyContext {
        NotifyContext::new(self)
    }
    pub(crate) fn rc(&mut self, component: ComponentId) -> RenderContext<'_> {
        self.0.rt.rc(component)
    }
}

/// Context for change notification.
#[repr(transparent)]
pub struct NotifyContext(ActionContext);

impl NotifyContext {
    fn new(ac: &mut ActionContext) -> &mut Self {
        unsafe { transmute(ac) }
    }
    pub fn request_update(&mut self, id: ComponentId) {
        request_update(id)
    }
}
