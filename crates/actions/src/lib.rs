//! Action resolution and dispatch.
//!
//! This crate provides:
//! - [`Flattener`], the path-joined key transform used by stored action records
//! - [`ActionResolver`], mapping rule action ids to nested [`ActionBundle`]s
//! - [`ActionDispatcher`], running one handler per enabled action kind
//! - Dispatch targets (webhook and log-only) behind one trait per channel
//! - [`TemplateRenderer`] for `{placeholder}` substitution in action text
//! - [`Background`], the drainable set of detached dispatch tasks

pub mod background;
pub mod bundle;
pub mod dispatcher;
pub mod error;
pub mod flatten;
pub mod handlers;
pub mod resolver;
pub mod targets;
pub mod templating;

pub use background::Background;
pub use bundle::{ActionBundle, ActionKind};
pub use dispatcher::ActionDispatcher;
pub use error::ActionError;
pub use flatten::Flattener;
pub use handlers::{ActionHandler, HandlerInput};
pub use resolver::ActionResolver;
pub use targets::{
    CommandRelay, KeySimulator, LogTarget, OverlayPresenter, OverlayRequest, SpeechPlayer,
    SpeechRequest, Targets, WebhookTarget,
};
pub use templating::TemplateRenderer;
