//! Resolver: builds the object graph for a token.
//!
//! ```text
//! resolve(token)
//!   ├─ enter the scope's gate            ScopeDisposed
//!   ├─ inspect the declared graph        UnknownToken, CircularDependency
//!   └─ walk
//!        ├─ Singleton → owner's slot ─┐
//!        ├─ Scoped    → current slot ─┼─ construct once, cache, track
//!        └─ Transient → construct every time
//! ```
//!
//! A slot is a once-cell: the first caller runs the factory while racers
//! wait, and a failed construction leaves the slot empty so the next
//! resolve retries.

use std::sync::Arc;

use tracing::{debug, trace, warn};

#[cfg(feature = "async")]
use crate::binding::BoxFuture;
use crate::binding::{Dependencies, Factory, Instance};
use crate::error::{CircularDependencyError, Result, TadbirError};
use crate::graph::unknown_token;
use crate::lifecycle::Lifecycle;
use crate::registry::Registration;
use crate::scope::{Found, ScopeInner, Slot};
use crate::token::Token;

/// Tokens currently being constructed by one resolve call.
#[derive(Debug, Default)]
pub(crate) struct ResolutionStack {
    path: Vec<Token>,
}

impl ResolutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if `token` is already under construction in this call.
    pub fn check(&self, token: &Token) -> Result<()> {
        let Some(start) = self.path.iter().position(|t| t == token) else {
            return Ok(());
        };

        let mut chain = self.path[start..].to_vec();
        chain.push(token.clone());
        warn!(cycle = ?chain, "Circular dependency detected while resolving");
        Err(TadbirError::CircularDependency(CircularDependencyError { chain }))
    }

    pub fn push(&mut self, token: &Token) {
        self.path.push(token.clone());
    }

    pub fn pop(&mut self) {
        self.path.pop();
    }

    pub fn last(&self) -> Option<&Token> {
        self.path.last()
    }
}

/// Resolves `token` in `scope`, blocking on factories and on racing
/// constructions.
pub(crate) fn resolve_blocking(scope: &Arc<ScopeInner>, token: &Token) -> Result<Instance> {
    let _guard = scope.enter()?;
    trace!(scope = %scope.id(), token = %token, "Resolving");

    if scope.shape_of(token)?.has_async {
        return Err(TadbirError::AsyncResolutionRequired { token: token.clone() });
    }
    walk_blocking(scope, token, &mut ResolutionStack::new())
}

fn locate(scope: &Arc<ScopeInner>, token: &Token, stack: &ResolutionStack) -> Result<Found> {
    let found = scope
        .lookup(token)
        .ok_or_else(|| unknown_token(scope, token, stack.last()))?;
    stack.check(&found.registration.token)?;
    Ok(found)
}

fn walk_blocking(scope: &Arc<ScopeInner>, token: &Token, stack: &mut ResolutionStack) -> Result<Instance> {
    let Found { registration, owner } = locate(scope, token, stack)?;

    match registration.lifecycle {
        Lifecycle::Singleton => cached_blocking(&owner, &registration, stack),
        Lifecycle::Scoped => cached_blocking(scope, &registration, stack),
        Lifecycle::Transient => {
            let instance = construct_blocking(scope, &registration, stack)?;
            track_transient(scope, &registration, &instance);
            Ok(instance)
        }
    }
}

fn cached_blocking(
    home: &Arc<ScopeInner>,
    registration: &Registration,
    stack: &mut ResolutionStack,
) -> Result<Instance> {
    let token = &registration.token;
    let slot = home.blocking_slot(token);
    let cell = match &*slot {
        Slot::Blocking(cell) => cell,
        #[cfg(feature = "async")]
        Slot::Awaitable(cell) => {
            return cell
                .get()
                .cloned()
                .ok_or_else(|| TadbirError::AsyncResolutionRequired { token: token.clone() });
        }
    };

    if let Some(instance) = cell.get() {
        trace!(token = %token, scope = %home.id(), "Cache hit");
        return Ok(instance.clone());
    }

    cell.get_or_try_init(|| {
        let instance = construct_blocking(home, registration, stack)?;
        home.track(registration, &instance);
        Ok(instance)
    })
    .cloned()
}

/// Resolves the declared dependencies in `context`, then runs the factory.
fn construct_blocking(
    context: &Arc<ScopeInner>,
    registration: &Registration,
    stack: &mut ResolutionStack,
) -> Result<Instance> {
    stack.push(&registration.token);
    let mut entries = Vec::with_capacity(registration.dependencies.len());
    for dependency in &registration.dependencies {
        match walk_blocking(context, dependency, stack) {
            Ok(instance) => entries.push((dependency.clone(), instance)),
            Err(err) => {
                stack.pop();
                return Err(err);
            }
        }
    }
    stack.pop();

    let factory = match &registration.factory {
        Factory::Blocking(factory) => factory,
        #[cfg(feature = "async")]
        Factory::Async(_) => {
            return Err(TadbirError::AsyncResolutionRequired {
                token: registration.token.clone(),
            });
        }
    };

    debug!(token = %registration.token, lifecycle = %registration.lifecycle, scope = %context.id(), "Constructing");
    factory(Dependencies::new(entries)).map_err(|source| failed(registration, source))
}

fn track_transient(scope: &ScopeInner, registration: &Registration, instance: &Instance) {
    if scope.settings().track_transient_disposables {
        scope.track(registration, instance);
    }
}

fn failed(registration: &Registration, source: crate::error::BoxError) -> TadbirError {
    debug!(token = %registration.token, error = %source, "Factory failed");
    TadbirError::FactoryFailed {
        token: registration.token.clone(),
        source,
    }
}

/// Resolves `token` in `scope`, awaiting async factories.
///
/// Graphs without async factories take the blocking path.
#[cfg(feature = "async")]
pub(crate) async fn resolve_awaitable(scope: &Arc<ScopeInner>, token: &Token) -> Result<Instance> {
    let _guard = scope.enter()?;
    trace!(scope = %scope.id(), token = %token, "Resolving async");

    let mut stack = ResolutionStack::new();
    if !scope.shape_of(token)?.has_async {
        return walk_blocking(scope, token, &mut stack);
    }
    walk_awaitable(scope, token, &mut stack).await
}

#[cfg(feature = "async")]
fn walk_awaitable<'a>(
    scope: &'a Arc<ScopeInner>,
    token: &'a Token,
    stack: &'a mut ResolutionStack,
) -> BoxFuture<'a, Result<Instance>> {
    Box::pin(async move {
        let Found { registration, owner } = locate(scope, token, stack)?;
        let context = match registration.lifecycle {
            Lifecycle::Singleton => owner,
            Lifecycle::Scoped | Lifecycle::Transient => scope.clone(),
        };

        // Subgraphs without async factories keep blocking slots.
        if !context.shape_of(&registration.token)?.has_async {
            return walk_blocking(scope, token, stack);
        }

        match registration.lifecycle {
            Lifecycle::Singleton | Lifecycle::Scoped => {
                cached_awaitable(&context, &registration, stack).await
            }
            Lifecycle::Transient => {
                let instance = construct_awaitable(&context, &registration, stack).await?;
                track_transient(&context, &registration, &instance);
                Ok(instance)
            }
        }
    })
}

#[cfg(feature = "async")]
async fn cached_awaitable(
    home: &Arc<ScopeInner>,
    registration: &Registration,
    stack: &mut ResolutionStack,
) -> Result<Instance> {
    let token = &registration.token;
    let slot = home.awaitable_slot(token);
    let cell = match &*slot {
        Slot::Awaitable(cell) => cell,
        Slot::Blocking(cell) => {
            return cell
                .get()
                .cloned()
                .ok_or_else(|| TadbirError::AsyncResolutionRequired { token: token.clone() });
        }
    };

    if let Some(instance) = cell.get() {
        trace!(token = %token, scope = %home.id(), "Cache hit");
        return Ok(instance.clone());
    }

    cell.get_or_try_init(move || async move {
        let instance = construct_awaitable(home, registration, stack).await?;
        home.track(registration, &instance);
        Ok::<_, TadbirError>(instance)
    })
    .await
    .cloned()
}

#[cfg(feature = "async")]
async fn construct_awaitable(
    context: &Arc<ScopeInner>,
    registration: &Registration,
    stack: &mut ResolutionStack,
) -> Result<Instance> {
    stack.push(&registration.token);
    let mut entries = Vec::with_capacity(registration.dependencies.len());
    for dependency in &registration.dependencies {
        match walk_awaitable(context, dependency, stack).await {
            Ok(instance) => entries.push((dependency.clone(), instance)),
            Err(err) => {
                stack.pop();
                return Err(err);
            }
        }
    }
    stack.pop();

    debug!(token = %registration.token, lifecycle = %registration.lifecycle, scope = %context.id(), "Constructing");
    let produced = match &registration.factory {
        Factory::Blocking(factory) => factory(Dependencies::new(entries)),
        Factory::Async(factory) => factory(Dependencies::new(entries)).await,
    };
    produced.map_err(|source| failed(registration, source))
}
