//! Bindings describe how to build a value before it is keyed by a token.
//!
//! A [`Binding<T>`] carries a lifecycle, the tokens its factory depends
//! on, the factory itself and an optional teardown. Factories receive the
//! resolved dependencies as [`Dependencies`], in declared order.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use tadbir_container::prelude::*;
//!
//! struct Config { url: String }
//! struct Database { url: String }
//!
//! let container = Container::new();
//! container.register("config", Binding::singleton(|_| Ok(Config { url: "x".into() })))?;
//! container.register(
//!     "db",
//!     Binding::singleton(|deps| {
//!         let config: Arc<Config> = deps.at(0)?;
//!         Ok(Database { url: config.url.clone() })
//!     })
//!     .depends_on(["config"]),
//! )?;
//!
//! let db: Arc<Database> = container.resolve("db")?;
//! assert_eq!(db.url, "x");
//! # Ok::<(), TadbirError>(())
//! ```

use std::any::{Any, type_name};
use std::fmt;
#[cfg(feature = "async")]
use std::future::Future;
use std::marker::PhantomData;
#[cfg(feature = "async")]
use std::pin::Pin;
use std::sync::Arc;

use crate::disposal::Dispose;
use crate::error::{BoxError, Result, TadbirError};
use crate::lifecycle::Lifecycle;
use crate::token::Token;

/// A resolved, type-erased instance.
///
/// Identity of cached instances is `Arc` identity.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// What user factories and teardowns return.
pub type FactoryResult<T> = std::result::Result<T, BoxError>;

/// Boxed future returned by async factories.
#[cfg(feature = "async")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) type BlockingFactory = Arc<dyn Fn(Dependencies) -> FactoryResult<Instance> + Send + Sync>;

#[cfg(feature = "async")]
pub(crate) type AsyncFactory =
    Arc<dyn Fn(Dependencies) -> BoxFuture<'static, FactoryResult<Instance>> + Send + Sync>;

pub(crate) type Teardown = Arc<dyn Fn(&Instance) -> FactoryResult<()> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Factory {
    Blocking(BlockingFactory),
    #[cfg(feature = "async")]
    Async(AsyncFactory),
}

impl Factory {
    pub(crate) fn is_async(&self) -> bool {
        match self {
            Factory::Blocking(_) => false,
            #[cfg(feature = "async")]
            Factory::Async(_) => true,
        }
    }
}

/// Typed description of how to build a `T`.
pub struct Binding<T> {
    lifecycle: Lifecycle,
    dependencies: Vec<Token>,
    factory: Factory,
    teardown: Option<Teardown>,
    _produces: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Binding<T> {
    /// Binding with a blocking factory.
    pub fn new<F>(lifecycle: Lifecycle, factory: F) -> Self
    where
        F: Fn(Dependencies) -> FactoryResult<T> + Send + Sync + 'static,
    {
        let factory: BlockingFactory = Arc::new(move |deps: Dependencies| {
            factory(deps).map(|value| Arc::new(value) as Instance)
        });
        Self::from_factory(lifecycle, Factory::Blocking(factory))
    }

    pub fn singleton<F>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> FactoryResult<T> + Send + Sync + 'static,
    {
        Self::new(Lifecycle::Singleton, factory)
    }

    pub fn scoped<F>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> FactoryResult<T> + Send + Sync + 'static,
    {
        Self::new(Lifecycle::Scoped, factory)
    }

    pub fn transient<F>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> FactoryResult<T> + Send + Sync + 'static,
    {
        Self::new(Lifecycle::Transient, factory)
    }

    /// Singleton bound to an already constructed value.
    ///
    /// Every resolve returns the same `Arc`.
    pub fn instance(value: T) -> Self {
        let shared: Instance = Arc::new(value);
        let factory: BlockingFactory =
            Arc::new(move |_: Dependencies| -> FactoryResult<Instance> { Ok(shared.clone()) });
        Self::from_factory(Lifecycle::Singleton, Factory::Blocking(factory))
    }

    /// Binding with an async factory. Resolve it with `resolve_async`.
    #[cfg(feature = "async")]
    pub fn new_async<F, Fut>(lifecycle: Lifecycle, factory: F) -> Self
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryResult<T>> + Send + 'static,
    {
        let factory: AsyncFactory = Arc::new(
            move |deps: Dependencies| -> BoxFuture<'static, FactoryResult<Instance>> {
                let pending = factory(deps);
                Box::pin(async move { pending.await.map(|value| Arc::new(value) as Instance) })
            },
        );
        Self::from_factory(lifecycle, Factory::Async(factory))
    }

    #[cfg(feature = "async")]
    pub fn singleton_async<F, Fut>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryResult<T>> + Send + 'static,
    {
        Self::new_async(Lifecycle::Singleton, factory)
    }

    #[cfg(feature = "async")]
    pub fn scoped_async<F, Fut>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryResult<T>> + Send + 'static,
    {
        Self::new_async(Lifecycle::Scoped, factory)
    }

    #[cfg(feature = "async")]
    pub fn transient_async<F, Fut>(factory: F) -> Self
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryResult<T>> + Send + 'static,
    {
        Self::new_async(Lifecycle::Transient, factory)
    }

    /// Declares the tokens the factory receives, in order.
    pub fn depends_on<I, K>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Token>,
    {
        self.dependencies.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Tears instances down through their [`Dispose`] impl when the owning
    /// scope ends.
    pub fn disposable(self) -> Self
    where
        T: Dispose,
    {
        self.on_dispose(|value: &T| value.dispose())
    }

    /// Tears instances down with `teardown` when the owning scope ends.
    pub fn on_dispose<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&T) -> FactoryResult<()> + Send + Sync + 'static,
    {
        let erased: Teardown = Arc::new(move |instance: &Instance| -> FactoryResult<()> {
            match instance.downcast_ref::<T>() {
                Some(value) => teardown(value),
                None => Err(format!("teardown expected {}", type_name::<T>()).into()),
            }
        });
        self.teardown = Some(erased);
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn dependencies(&self) -> &[Token] {
        &self.dependencies
    }

    fn from_factory(lifecycle: Lifecycle, factory: Factory) -> Self {
        Self {
            lifecycle,
            dependencies: Vec::new(),
            factory,
            teardown: None,
            _produces: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("produces", &type_name::<T>())
            .field("lifecycle", &self.lifecycle)
            .field("dependencies", &self.dependencies)
            .field("async", &self.factory.is_async())
            .field("disposable", &self.teardown.is_some())
            .finish()
    }
}

/// A [`Binding`] with its output type erased.
///
/// This is what [`ProviderRegistry`](crate::provider::ProviderRegistry)
/// implementations receive.
pub struct ErasedBinding {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) dependencies: Vec<Token>,
    pub(crate) factory: Factory,
    pub(crate) teardown: Option<Teardown>,
    pub(crate) produces: &'static str,
}

impl ErasedBinding {
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn dependencies(&self) -> &[Token] {
        &self.dependencies
    }

    pub fn produces(&self) -> &'static str {
        self.produces
    }
}

impl<T: Send + Sync + 'static> From<Binding<T>> for ErasedBinding {
    fn from(binding: Binding<T>) -> Self {
        Self {
            lifecycle: binding.lifecycle,
            dependencies: binding.dependencies,
            factory: binding.factory,
            teardown: binding.teardown,
            produces: type_name::<T>(),
        }
    }
}

impl fmt::Debug for ErasedBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedBinding")
            .field("produces", &self.produces)
            .field("lifecycle", &self.lifecycle)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Resolved values of a registration's declared dependencies.
#[derive(Clone)]
pub struct Dependencies {
    entries: Vec<(Token, Instance)>,
}

impl Dependencies {
    pub(crate) fn new(entries: Vec<(Token, Instance)>) -> Self {
        Self { entries }
    }

    /// Typed dependency at declared position `index`.
    pub fn at<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        let (token, instance) =
            self.entries
                .get(index)
                .ok_or_else(|| TadbirError::UndeclaredDependency {
                    requested: format!("#{index}"),
                    declared: self.entries.len(),
                })?;
        downcast(token, instance.clone())
    }

    /// Typed dependency declared as `token`.
    pub fn get<T: Send + Sync + 'static>(&self, token: impl Into<Token>) -> Result<Arc<T>> {
        let token = token.into();
        let (_, instance) = self
            .entries
            .iter()
            .find(|(declared, _)| *declared == token)
            .ok_or_else(|| TadbirError::UndeclaredDependency {
                requested: token.to_string(),
                declared: self.entries.len(),
            })?;
        downcast(&token, instance.clone())
    }

    /// Untyped dependency at declared position `index`.
    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.entries.get(index).map(|(_, instance)| instance)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(token, _)| token))
            .finish()
    }
}

pub(crate) fn downcast<T: Send + Sync + 'static>(token: &Token, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| TadbirError::TypeMismatch {
            token: token.clone(),
            expected: type_name::<T>(),
        })
}
