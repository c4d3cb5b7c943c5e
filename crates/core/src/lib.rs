pub mod config;
pub mod error;
pub mod event;
pub mod value;

pub use config::{Config, DispatchMode};
pub use error::*;
pub use event::*;
