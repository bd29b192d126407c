use crate::{
    core::{ComponentId, RenderContext},
    dom::Node,
    locals::Changed,
    reconciler::Repeat,
    template::{NodePath, Sink, Template},
    Diagnostic, Error, EvalError, Expr, Locals, Subscription, Value,
};

/// Live copy of a [`Template`] bound to a locals context.
///
/// The instance owns its root nodes, the binding state of every bound node,
/// and the repeat regions nested in it.
pub struct TemplateInstance {
    // parent of the roots until they are inserted
    _fragment: Node,
    roots: Vec<Node>,
    bindings: Vec<BoundBinding>,
    repeats: Vec<Repeat>,
    locals: Locals,
    is_destroyed: bool,
}

struct BoundBinding {
    node: Node,
    target: NodePath,
    sink: Sink,
    expr: Expr,
    last: Option<Value>,
    is_evaluated: bool,
    listener: Subscription,
}

impl TemplateInstance {
    /// Clones the template into a detached fragment.
    ///
    /// The fragment holds the nodes until they are inserted into the document.
    /// Nothing is evaluated until the first [`refresh`](Self::refresh).
    pub fn new(template: &Template, locals: Locals) -> Self {
        let roots = template.clone_roots();

        // Paths are resolved before nested regions insert nodes next to their anchors.
        let bindings = template
            .bindings()
            .iter()
            .filter_map(|b| {
                Some(BoundBinding {
                    node: b.target.resolve(&roots)?,
                    target: b.target.clone(),
                    sink: b.sink.clone(),
                    expr: b.expr.clone(),
                    last: None,
                    is_evaluated: false,
                    listener: Subscription::empty(),
                })
            })
            .collect();
        let repeats = template
            .repeats()
            .iter()
            .filter_map(|block| {
                let anchor = block.anchor.resolve(&roots)?;
                Some(Repeat::new(block.clone(), anchor))
            })
            .collect();

        let fragment = Node::fragment();
        for root in &roots {
            fragment.append_child(root);
            root.set_locals(locals.clone());
        }
        Self {
            _fragment: fragment,
            roots,
            bindings,
            repeats,
            locals,
            is_destroyed: false,
        }
    }

    pub fn locals(&self) -> &Locals {
        &self.locals
    }
    pub fn is_destroyed(&self) -> bool {
        self.is_destroyed
    }
    pub fn repeats(&self) -> &[Repeat] {
        &self.repeats
    }

    /// Replaces the locals context and returns the names of the top layer that changed.
    pub fn set_locals(&mut self, locals: Locals) -> Changed {
        let changed = locals.changed_own(&self.locals);
        for root in &self.roots {
            root.set_locals(locals.clone());
        }
        self.locals = locals;
        changed
    }

    /// Binds every repeat region of this instance to the collection its source evaluates to.
    pub(crate) fn bind(&mut self, component: ComponentId) -> Result<(), Error> {
        for repeat in &mut self.repeats {
            repeat.bind(&self.locals, component)?;
        }
        Ok(())
    }

    /// Rebinds the repeat regions whose source reads a name of `changed`, evaluating against `locals`.
    pub(crate) fn bind_changed(
        &mut self,
        locals: &Locals,
        changed: &Changed,
        component: ComponentId,
    ) -> Result<(), Error> {
        for repeat in &mut self.repeats {
            if changed.affects(repeat.block().source.reads()) {
                repeat.bind(locals, component)?;
            }
        }
        Ok(())
    }

    /// Re-runs the bindings that read a changed name, then refreshes the nested regions.
    pub fn refresh(&mut self, changed: &Changed, cx: &mut RenderContext) {
        if self.is_destroyed {
            tracing::trace!("refresh of destroyed instance ignored");
            return;
        }
        for binding in &mut self.bindings {
            if binding.is_evaluated && !changed.affects(binding.expr.reads()) {
                continue;
            }
            binding.is_evaluated = true;
            let result = binding
                .expr
                .eval(&self.locals)
                .and_then(|value| binding.apply(value));
            if let Err(error) = result {
                cx.report(Diagnostic::Binding {
                    target: binding.target.clone(),
                    sink: binding.sink.to_string(),
                    error,
                });
            }
        }
        for repeat in &mut self.repeats {
            repeat.refresh(&self.locals, changed, cx);
        }
    }

    /// Nodes of this instance in document order.
    ///
    /// Nodes rendered by a region anchored on a root node sit beside that root and are included.
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        for root in &self.roots {
            nodes.push(root.clone());
            for repeat in &self.repeats {
                if repeat.block().anchor.is_root() && repeat.anchor().ptr_eq(root) {
                    nodes.extend(repeat.nodes());
                }
            }
        }
        nodes
    }

    /// Removes the nodes, releases the event listeners and destroys the nested regions.
    pub fn destroy(&mut self) {
        if self.is_destroyed {
            tracing::trace!("instance already destroyed");
            return;
        }
        self.is_destroyed = true;
        for repeat in &mut self.repeats {
            repeat.destroy();
        }
        for binding in &mut self.bindings {
            binding.listener = Subscription::empty();
        }
        for root in &self.roots {
            root.remove();
        }
    }
}
impl BoundBinding {
    fn apply(&mut self, value: Value) -> Result<(), EvalError> {
        if self.last.as_ref() == Some(&value) {
            return Ok(());
        }
        match &self.sink {
            Sink::TextContent => self.node.set_text_content(&value.to_string()),
            Sink::Attribute(name) => match value {
                Value::Null | Value::Bool(false) => self.node.remove_attribute(name),
                Value::Bool(true) => self.node.set_attribute(name, ""),
                ref value => self.node.set_attribute(name, &value.to_string()),
            },
            Sink::Property(name) => self.node.set_property(name, value.clone()),
            Sink::Event(name) => match &value {
                Value::Callback(callback) => {
                    self.listener = Subscription::empty();
                    self.listener = self.node.subscribe(name, callback.clone());
                }
                Value::Null => self.listener = Subscription::empty(),
                value => {
                    return Err(EvalError::new(format!(
                        "expected callback, found {}",
                        value.type_name()
                    )))
                }
            },
        }
        self.last = Some(value);
        Ok(())
    }
}
