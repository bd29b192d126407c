//! Runtime for declarative UI components whose repeat regions are reconciled incrementally
//! against observed sequences and keyed maps.

mod collections;
mod component;
mod core;
pub mod dom;
mod error;
mod instance;
mod locals;
mod reconciler;
mod subscription;
pub mod template;
mod utils;
mod value;

pub use collections::{Collection, CollectionKind, EntriesMut, ItemsMut, StateMap, StateVec};
pub use component::Component;
pub use crate::core::{
    request_update, ActionContext, ComponentId, FrameScheduler, NotifyContext, RenderContext,
    Runtime,
};
pub use error::{Diagnostic, Error, EvalError};
pub use instance::TemplateInstance;
pub use locals::{names, Changed, ItemLocals, Locals};
pub use reconciler::Repeat;
pub use subscription::Subscription;
pub use template::{Expr, RepeatOptions, Sink, Template};
pub use value::{Callback, Value, ValueKey};
