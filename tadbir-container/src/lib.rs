//! Core container implementation for Tadbir DI.

pub mod binding;
pub mod container;
pub mod disposal;
pub mod error;
mod gate;
mod graph;
pub mod lifecycle;
pub mod provider;
mod registry;
mod resolver;
pub mod scope;
pub mod settings;
pub mod token;

pub use binding::{Binding, Dependencies, FactoryResult, Instance};
pub use container::{Container, ContainerBuilder, prelude};
pub use disposal::Dispose;
pub use error::{BoxError, Result, TadbirError};
pub use lifecycle::Lifecycle;
pub use provider::{Provider, ProviderRegistry};
pub use scope::{Scope, ScopeId};
pub use settings::{ContainerSettings, DuplicatePolicy};
pub use token::Token;
