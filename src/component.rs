use std::{
    cell::RefCell,
    fmt::{self, Debug},
    mem::replace,
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use indexmap::IndexMap;

use crate::{
    core::{register_component, request_update, unregister_component, ComponentId, UpdateTarget},
    dom::Node,
    instance::TemplateInstance,
    locals::Changed,
    template::Template,
    ActionContext, Error, Locals, RenderContext, Value,
};

/// Component mounted on a host node.
///
/// Properties are exposed to the root template as locals.
/// Writing a property schedules a render pass that updates only what depends on it.
#[derive(Ex)]
#[derive_ex(Clone)]
pub struct Component(Rc<ComponentNode>);

struct ComponentNode {
    id: ComponentId,
    host: Node,
    data: RefCell<ComponentData>,
}

struct ComponentData {
    properties: IndexMap<Rc<str>, Value>,
    locals: Locals,
    changed: Changed,
    root: Option<TemplateInstance>,
}

impl Component {
    /// Instantiates `template` into `host` and requests the first render pass.
    ///
    /// Fails if a repeat region of the root template is bound to a value that is not a collection.
    pub fn new<K, V>(
        host: &Node,
        template: &Template,
        properties: impl IntoIterator<Item = (K, V)>,
        ac: &mut ActionContext,
    ) -> Result<Self, Error>
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let properties: IndexMap<Rc<str>, Value> = properties
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        let locals = Locals::from_entries(properties.clone());
        let mut root = TemplateInstance::new(template, locals.clone());
        let node = Rc::new_cyclic(|this: &Weak<ComponentNode>| ComponentNode {
            id: register_component(this.clone()),
            host: host.clone(),
            data: RefCell::new(ComponentData {
                properties,
                locals,
                changed: Changed::All,
                root: None,
            }),
        });
        root.bind(node.id)?;
        for n in root.nodes() {
            host.append_child(&n);
        }
        node.data.borrow_mut().root = Some(root);
        tracing::trace!(component = %node.id, "component created");
        ac.nc().request_update(node.id);
        Ok(Self(node))
    }

    pub fn id(&self) -> ComponentId {
        self.0.id
    }
    pub fn host(&self) -> &Node {
        &self.0.host
    }
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.data.borrow().properties.get(name).cloned()
    }

    /// Writes a property.
    ///
    /// A repeat region reading the property switches to the new collection immediately.
    /// If the new value is not a collection, the previous value is restored and the error is returned.
    pub fn set(
        &self,
        name: &str,
        value: impl Into<Value>,
        ac: &mut ActionContext,
    ) -> Result<(), Error> {
        let mut data = self.0.data.borrow_mut();
        let data = &mut *data;
        let Some(root) = &mut data.root else {
            tracing::trace!(component = %self.0.id, name, "property write after teardown ignored");
            return Ok(());
        };
        let name: Rc<str> = name.into();
        let previous = data.properties.insert(name.clone(), value.into());
        let locals = Locals::from_entries(data.properties.clone());
        let changed = locals.changed_own(&data.locals);
        if changed.is_empty() {
            return Ok(());
        }
        if let Err(e) = root.bind_changed(&locals, &changed, self.0.id) {
            match previous {
                Some(previous) => data.properties.insert(name, previous),
                None => data.properties.shift_remove(&name),
            };
            let _ = root.bind_changed(&data.locals, &changed, self.0.id);
            return Err(e);
        }
        data.locals = locals;
        data.changed.extend(changed);
        ac.nc().request_update(self.0.id);
        Ok(())
    }

    /// Runs a render pass now.
    pub fn render(&self, ac: &mut ActionContext) {
        self.0.render_pass(&mut ac.rc(self.0.id));
    }

    /// Destroys the rendered content and stops observing collections.
    ///
    /// Later render passes and property writes do nothing.
    pub fn teardown(&self) {
        match self.0.data.borrow_mut().root.take() {
            Some(mut root) => {
                root.destroy();
                tracing::trace!(component = %self.0.id, "component torn down");
            }
            None => tracing::trace!(component = %self.0.id, "component already torn down"),
        }
    }

    /// Requests a render pass on the next frame.
    pub fn request_update(&self) {
        request_update(self.0.id)
    }

    /// Returns `true` if the host is attached to a document.
    pub fn is_connected(&self) -> bool {
        self.0.host.is_connected()
    }

    /// Root template instance, `None` after teardown.
    pub fn with_root<T>(&self, f: impl FnOnce(Option<&TemplateInstance>) -> T) -> T {
        f(self.0.data.borrow().root.as_ref())
    }
}
impl Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.data.borrow();
        f.debug_struct("Component")
            .field("id", &self.0.id)
            .field("properties", &data.properties)
            .field("is_torn_down", &data.root.is_none())
            .finish()
    }
}

impl ComponentNode {
    fn render_pass(&self, cx: &mut RenderContext) {
        let mut data = self.data.borrow_mut();
        let data = &mut *data;
        let Some(root) = &mut data.root else {
            tracing::trace!(component = %self.id, "render after teardown ignored");
            return;
        };
        let mut changed = replace(&mut data.changed, Changed::none());
        changed.extend(root.set_locals(data.locals.clone()));
        tracing::trace!(component = %self.id, ?changed, "render");
        root.refresh(&changed, cx);
    }
}
impl UpdateTarget for ComponentNode {
    fn id(&self) -> ComponentId {
        self.id
    }
    fn is_connected(&self) -> bool {
        self.host.is_connected()
    }
    fn render(self: Rc<Self>, cx: &mut RenderContext) {
        self.render_pass(cx)
    }
}
impl Drop for ComponentNode {
    fn drop(&mut self) {
        unregister_component(self.id);
    }
}
