//! Borealis Engine - GraphQL data source and invocation engine.

mod datasource;
mod error;
mod runtime;
mod template;

pub use datasource::{transform_value, ErrorExtensions, GraphQlError, Source};
pub use error::{EngineError, Result};
pub use runtime::{DetachedGraphQl, FunctionRuntime, Invocation, UnconfiguredModels};
pub use template::{CallInfo, TemplateField};
