//! # The Container — heart of Tadbir
//!
//! Owns the root scope, which holds the base registry and every Singleton
//! registered on it.
//!
//! # Architecture
//! ```text
//! ContainerBuilder  ──build()──>  Container (root scope)
//!                                    │
//!                              create_scope()
//!                                    │
//!                                    ▼
//!                                  Scope ── create_scope() ──> Scope ...
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tadbir_container::prelude::*;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let container = Container::builder()
//!     .register("logger", Binding::singleton(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)))
//!     .register(
//!         "users",
//!         Binding::transient(|deps| {
//!             let logger: Arc<Arc<dyn Logger>> = deps.at(0)?;
//!             Ok(UserService { logger: Arc::clone(&*logger) })
//!         })
//!         .depends_on(["logger"]),
//!     )
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service: Arc<UserService> = container.resolve("users").expect("Failed to resolve");
//! service.logger.log("ready");
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::binding::{Binding, ErasedBinding, Instance};
use crate::error::Result;
use crate::provider::{Provider, ProviderRegistry};
use crate::scope::Scope;
use crate::settings::{ContainerSettings, DuplicatePolicy};
use crate::token::Token;

// ============================================================
// ContainerBuilder
// ============================================================

enum Pending {
    Binding(Token, ErasedBinding),
    Alias(Token, Token),
    Provider(Box<dyn Provider>),
}

/// Collects registrations, then builds a validated, frozen [`Container`].
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .singleton_value(Config::load())
///     .bind::<Database>(Binding::singleton(|deps| { ... }).depends_on([Token::of::<Config>()]))
///     .add_provider(AuthProvider)
///     .build()?;
/// ```
pub struct ContainerBuilder {
    settings: ContainerSettings,
    pending: Vec<Pending>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            settings: ContainerSettings::default(),
            pending: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Allow overriding previously registered tokens (last write wins).
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.settings.duplicate_policy = if allow {
            DuplicatePolicy::Replace
        } else {
            DuplicatePolicy::Reject
        };
        self
    }

    /// Reject longer-lived registrations that declare shorter-lived
    /// dependencies.
    pub fn reject_captive_dependencies(mut self, reject: bool) -> Self {
        self.settings.reject_captive_dependencies = reject;
        self
    }

    pub fn register<T: Send + Sync + 'static>(mut self, token: impl Into<Token>, binding: Binding<T>) -> Self {
        self.pending.push(Pending::Binding(token.into(), binding.into()));
        self
    }

    /// Registers `binding` under the token of `T` itself.
    pub fn bind<T: Send + Sync + 'static>(self, binding: Binding<T>) -> Self {
        self.register(Token::of::<T>(), binding)
    }

    /// Registers a pre-built value as a Singleton keyed by its type.
    pub fn singleton_value<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.bind(Binding::instance(value))
    }

    pub fn alias(mut self, from: impl Into<Token>, to: impl Into<Token>) -> Self {
        self.pending.push(Pending::Alias(from.into(), to.into()));
        self
    }

    /// Add a [`Provider`] module.
    pub fn add_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.pending.push(Pending::Provider(Box::new(provider)));
        self
    }

    /// Registers everything, validates the whole graph when
    /// `validate_on_build` is set, and freezes the registry.
    ///
    /// # Errors
    /// The first registration or validation error.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        info!(pending = self.pending.len(), "Building container");

        let container = Container::with_settings(self.settings);
        let mut root = container.root.clone();
        for pending in self.pending {
            match pending {
                Pending::Binding(token, binding) => root.register_erased(token, binding)?,
                Pending::Alias(from, to) => root.register_alias(from, to)?,
                Pending::Provider(provider) => root.install(provider.as_ref())?,
            }
        }

        if container.settings().validate_on_build {
            container.validate()?;
        }
        container.freeze();

        info!("Container built successfully ✓");
        Ok(container)
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("settings", &self.settings)
            .field("pending", &self.pending.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Thread-safe dependency injection container.
///
/// Registrations are accepted until [`freeze`](Container::freeze) or the
/// first successful resolve. Every operation is a thin delegate to the
/// root [`Scope`].
pub struct Container {
    root: Scope,
}

impl Container {
    pub fn new() -> Self {
        Self::with_settings(ContainerSettings::default())
    }

    pub fn with_settings(settings: ContainerSettings) -> Self {
        debug!(?settings, "Creating container");
        Self {
            root: Scope::root(settings),
        }
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn settings(&self) -> &ContainerSettings {
        self.root.settings()
    }

    /// The root scope, which caches base Singletons.
    pub fn root(&self) -> &Scope {
        &self.root
    }

    pub fn register<T: Send + Sync + 'static>(&self, token: impl Into<Token>, binding: Binding<T>) -> Result<()> {
        self.root.register(token, binding)
    }

    pub fn alias(&self, from: impl Into<Token>, to: impl Into<Token>) -> Result<()> {
        self.root.alias(from, to)
    }

    pub fn install(&self, provider: &dyn Provider) -> Result<()> {
        self.root.install(provider)
    }

    pub fn freeze(&self) {
        self.root.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.root.is_frozen()
    }

    /// Checks every base registration without running any factory.
    pub fn validate(&self) -> Result<()> {
        self.root.validate()
    }

    /// Resolve a dependency by token.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = container.resolve("db")?;
    /// ```
    pub fn resolve<T: Send + Sync + 'static>(&self, token: impl Into<Token>) -> Result<Arc<T>> {
        self.root.resolve(token)
    }

    pub fn resolve_any(&self, token: impl Into<Token>) -> Result<Instance> {
        self.root.resolve_any(token)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.root.get()
    }

    #[cfg(feature = "async")]
    pub async fn resolve_async<T: Send + Sync + 'static>(&self, token: impl Into<Token>) -> Result<Arc<T>> {
        self.root.resolve_async(token).await
    }

    #[cfg(feature = "async")]
    pub async fn resolve_any_async(&self, token: impl Into<Token>) -> Result<Instance> {
        self.root.resolve_any_async(token).await
    }

    #[cfg(feature = "async")]
    pub async fn get_async<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.root.get_async().await
    }

    pub fn create_scope(&self) -> Result<Scope> {
        self.root.create_scope()
    }

    /// Disposes `scope` and everything below it.
    pub fn dispose_scope(&self, scope: &Scope) -> Result<()> {
        scope.dispose()
    }

    /// Disposes the root scope, and with it every live scope.
    pub fn dispose(&self) -> Result<()> {
        self.root.dispose()
    }

    #[cfg(feature = "async")]
    pub async fn dispose_async(&self) -> Result<()> {
        self.root.dispose_async().await
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container").field("root", &self.root).finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::binding::{Binding, Dependencies, FactoryResult, Instance};
    pub use crate::disposal::Dispose;
    pub use crate::error::{BoxError, Result, TadbirError};
    pub use crate::lifecycle::Lifecycle;
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::scope::{Scope, ScopeId};
    pub use crate::settings::{ContainerSettings, DuplicatePolicy};
    pub use crate::token::Token;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
