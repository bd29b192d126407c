//! Compiled binding program of a component or a repeated block.

use std::{
    fmt::{self, Debug},
    rc::Rc,
};

use derive_ex::Ex;
use parse_display::Display;

use crate::{dom::Node, Error, EvalError, Locals, Value};


/// Position of a node in a template, as child indices starting from the list of root nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct NodePath(Rc<[usize]>);

impl NodePath {
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into().into())
    }
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
    /// Returns `true` if the path designates one of the root nodes.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }
    pub fn resolve(&self, roots: &[Node]) -> Option<Node> {
        let (first, rest) = self.0.split_first()?;
        let mut node = roots.get(*first)?.clone();
        for &index in rest {
            node = node.child(index)?;
        }
        Some(node)
    }
}
impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, "/")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}
impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self::new(indices)
    }
}
impl From<&[usize]> for NodePath {
    fn from(indices: &[usize]) -> Self {
        Self::new(indices)
    }
}
impl<const N: usize> From<[usize; N]> for NodePath {
    fn from(indices: [usize; N]) -> Self {
        Self::new(indices)
    }
}

/// Destination of a binding's value.
#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    #[display("text-content")]
    TextContent,
    #[display("attribute `{0}`")]
    Attribute(Rc<str>),
    #[display("property `{0}`")]
    Property(Rc<str>),
    #[display("event `{0}`")]
    Event(Rc<str>),
}

impl Sink {
    pub fn attribute(name: &str) -> Self {
        Sink::Attribute(name.into())
    }
    pub fn property(name: &str) -> Self {
        Sink::Property(name.into())
    }
    pub fn event(name: &str) -> Self {
        Sink::Event(name.into())
    }
    fn name(&self) -> Option<&str> {
        match self {
            Sink::TextContent => None,
            Sink::Attribute(name) | Sink::Property(name) | Sink::Event(name) => Some(name),
        }
    }
}

/// Expression evaluated against a locals context.
///
/// `reads` lists the names the expression depends on.
/// A binding re-runs only when one of them changed.
#[derive(Ex)]
#[derive_ex(Clone)]
pub struct Expr {
    reads: Rc<[Rc<str>]>,
    eval: Rc<dyn Fn(&Locals) -> Result<Value, EvalError>>,
}

impl Expr {
    pub fn new<'a>(
        reads: impl IntoIterator<Item = &'a str>,
        eval: impl Fn(&Locals) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self {
            reads: reads.into_iter().map(Rc::from).collect(),
            eval: Rc::new(eval),
        }
    }

    /// Value of the local `name`.
    pub fn local(name: &str) -> Self {
        Self::path(name)
    }

    /// Walks a dotted path such as `item.values.0`.
    ///
    /// The first segment names a local.
    /// Later segments index into maps by key and into sequences by position.
    /// A missing key or position yields [`Value::Null`].
    pub fn path(path: &str) -> Self {
        let segments: Rc<[Rc<str>]> = path.split('.').map(Rc::from).collect();
        let name = segments[0].clone();
        Self::new([&*name], move |locals| {
            let mut value = locals
                .get(&segments[0])
                .cloned()
                .ok_or_else(|| EvalError::new(format!("`{}` is not defined", segments[0])))?;
            for segment in &segments[1..] {
                value = match &value {
                    Value::Map(map) => map.get(segment).unwrap_or_default(),
                    Value::Vec(vec) => match segment.parse::<usize>() {
                        Ok(index) => vec.get(index).unwrap_or_default(),
                        Err(_) if &**segment == "length" => vec.len().into(),
                        Err(_) => Value::Null,
                    },
                    Value::Str(s) if &**segment == "length" => s.chars().count().into(),
                    value => {
                        return Err(EvalError::new(format!(
                            "cannot read `{segment}` of {}",
                            value.type_name()
                        )))
                    }
                };
            }
            Ok(value)
        })
    }

    /// Expression that reads nothing and always yields `value`.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new([], move |_| Ok(value.clone()))
    }

    pub fn reads(&self) -> &[Rc<str>] {
        &self.reads
    }
    pub fn eval(&self, locals: &Locals) -> Result<Value, EvalError> {
        (self.eval)(locals)
    }
}
impl Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr").field("reads", &self.reads).finish()
    }
}

/// Binding of an expression to a sink of one node.
#[derive(Clone, Debug)]
pub struct Binding {
    pub target: NodePath,
    pub sink: Sink,
    pub expr: Expr,
}

/// Options of a repeat region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepeatOptions {
    /// Name under which the current item is exposed.
    pub item: Rc<str>,
}

impl RepeatOptions {
    pub fn new() -> Self {
        Self {
            item: crate::locals::names::ITEM.into(),
        }
    }
    pub fn item(name: &str) -> Self {
        Self { item: name.into() }
    }
}
impl Default for RepeatOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Repeat region: `template` is stamped once per item of the collection `source` evaluates to,
/// right after the marker comment at `anchor`.
#[derive(Clone, Debug)]
pub struct RepeatBlock {
    pub anchor: NodePath,
    pub source: Expr,
    pub options: RepeatOptions,
    pub template: Template,
}

/// Immutable binding program: prototype nodes plus the bindings and repeat regions that target them.
#[derive(Ex)]
#[derive_ex(Clone)]
pub struct Template(Rc<RawTemplate>);

struct RawTemplate {
    roots: Vec<Node>,
    bindings: Vec<Binding>,
    repeats: Vec<RepeatBlock>,
}

impl Template {
    pub fn builder(roots: impl IntoIterator<Item = Node>) -> TemplateBuilder {
        TemplateBuilder {
            roots: roots.into_iter().collect(),
            bindings: Vec::new(),
            repeats: Vec::new(),
        }
    }
    pub fn roots(&self) -> &[Node] {
        &self.0.roots
    }
    pub fn bindings(&self) -> &[Binding] {
        &self.0.bindings
    }
    pub fn repeats(&self) -> &[RepeatBlock] {
        &self.0.repeats
    }

    /// Deep copies of the prototype root nodes.
    pub(crate) fn clone_roots(&self) -> Vec<Node> {
        self.0.roots.iter().map(Node::deep_clone).collect()
    }
}
impl Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("roots", &self.0.roots)
            .field("bindings", &self.0.bindings)
            .field("repeats", &self.0.repeats)
            .finish()
    }
}

pub struct TemplateBuilder {
    roots: Vec<Node>,
    bindings: Vec<Binding>,
    repeats: Vec<RepeatBlock>,
}

impl TemplateBuilder {
    pub fn bind(mut self, target: impl Into<NodePath>, sink: Sink, expr: Expr) -> Self {
        self.bindings.push(Binding {
            target: target.into(),
            sink,
            expr,
        });
        self
    }
    pub fn repeat(
        mut self,
        anchor: impl Into<NodePath>,
        source: Expr,
        options: RepeatOptions,
        template: Template,
    ) -> Self {
        self.repeats.push(RepeatBlock {
            anchor: anchor.into(),
            source,
            options,
            template,
        });
        self
    }

    pub fn build(self) -> Result<Template, Error> {
        for binding in &self.bindings {
            let node = binding
                .target
                .resolve(&self.roots)
                .ok_or_else(|| Error::InvalidTarget(binding.target.clone()))?;
            if binding.sink.name() == Some("") {
                return Err(Error::EmptyName);
            }
            if let Sink::Event(name) = &binding.sink {
                if !node.is_element() {
                    return Err(Error::InvalidEventTarget(name.clone()));
                }
            }
        }
        for repeat in &self.repeats {
            let node = repeat
                .anchor
                .resolve(&self.roots)
                .ok_or_else(|| Error::InvalidTarget(repeat.anchor.clone()))?;
            if !node.is_comment() {
                return Err(Error::InvalidAnchor(repeat.anchor.clone()));
            }
            if repeat.options.item.is_empty() {
                return Err(Error::EmptyName);
            }
        }
        Ok(Template(Rc::new(RawTemplate {
            roots: self.roots,
            bindings: self.bindings,
            repeats: self.repeats,
        })))
    }
}
