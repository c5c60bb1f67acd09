//! Provider trait — a module of related registrations.
//!
//! Providers group related bindings together so an application can split
//! its wiring by domain instead of one long registration block.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use tadbir_container::prelude::*;
//!
//! struct Database { url: String }
//!
//! struct DatabaseProvider;
//!
//! impl Provider for DatabaseProvider {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
//!         registry.bind("db.url", Binding::instance(String::from("postgres://localhost")))?;
//!         registry.bind(
//!             "db",
//!             Binding::singleton(|deps| {
//!                 let url: Arc<String> = deps.at(0)?;
//!                 Ok(Database { url: url.to_string() })
//!             })
//!             .depends_on(["db.url"]),
//!         )
//!     }
//! }
//!
//! let container = Container::new();
//! container.install(&DatabaseProvider)?;
//! let db: Arc<Database> = container.resolve("db")?;
//! assert_eq!(db.url, "postgres://localhost");
//! # Ok::<(), TadbirError>(())
//! ```

use crate::binding::{Binding, ErasedBinding};
use crate::error::Result;
use crate::token::Token;

/// A module that registers related bindings into a container or scope.
pub trait Provider: Send + Sync {
    /// Registers this provider's bindings.
    fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Where providers register.
///
/// Implemented by [`Scope`](crate::scope::Scope); providers only see this
/// trait, so they can be tested against a mock.
pub trait ProviderRegistry {
    fn register_erased(&mut self, token: Token, binding: ErasedBinding) -> Result<()>;

    fn register_alias(&mut self, from: Token, to: Token) -> Result<()>;
}

impl dyn ProviderRegistry + '_ {
    /// Typed convenience over [`register_erased`](ProviderRegistry::register_erased).
    pub fn bind<T: Send + Sync + 'static>(
        &mut self,
        token: impl Into<Token>,
        binding: Binding<T>,
    ) -> Result<()> {
        self.register_erased(token.into(), binding.into())
    }
}
