use std::rc::Rc;

use parse_display::Display;

use crate::template::NodePath;

/// Configuration error, detected when a binding is established.
///
/// A region with a configuration error is not rendered.
#[derive(Display, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[display("unsupported collection shape: expected a sequence or keyed map, found {0}")]
    UnsupportedCollection(&'static str),
    #[display("binding target `{0}` does not resolve to a node of the template")]
    InvalidTarget(NodePath),
    #[display("repeat anchor `{0}` is not a marker comment")]
    InvalidAnchor(NodePath),
    #[display("event binding `{0}` requires an element target")]
    InvalidEventTarget(Rc<str>),
    #[display("binding name is empty")]
    EmptyName,
    #[display("collection source failed: {0}")]
    Source(EvalError),
}

impl std::error::Error for Error {}

/// Failure of an expression evaluated against a locals context.
#[derive(Display, Debug, Clone, PartialEq)]
#[display("{message}")]
pub struct EvalError {
    message: Rc<str>,
}

impl EvalError {
    pub fn new(message: impl Into<Rc<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::error::Error for EvalError {}

/// Transient error reported by a render pass.
///
/// The pass continues. Only the binding or region that failed is skipped.
#[derive(Display, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Diagnostic {
    #[display("binding `{target}` of `{sink}` failed: {error}")]
    Binding {
        target: NodePath,
        sink: String,
        error: EvalError,
    },
    #[display("repeat region `{anchor}` disabled: {error}")]
    Region { anchor: NodePath, error: Error },
}
