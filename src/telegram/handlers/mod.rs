//! Meta-bot handler tree configuration
//!
//! The dispatcher schema is built from plain functions over [`HandlerDeps`],
//! so integration tests can drive the same handlers as production.

mod commands;
mod flow;
mod schema;
mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
