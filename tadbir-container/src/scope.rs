//! Scopes: the unit of caching and of disposal.
//!
//! ```text
//! root scope (Singletons, base registry)
//!    ├── scope-1 (Scoped instances, local overrides)
//!    │      └── scope-3
//!    └── scope-2
//! ```
//!
//! Lookups walk from the current scope towards the root; the nearest
//! registration wins. Disposing a scope disposes its live children first.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

#[cfg(feature = "async")]
use crate::binding::BoxFuture;
use crate::binding::{Binding, ErasedBinding, Instance, downcast};
use crate::disposal::DisposalTracker;
use crate::error::{DisposalError, DisposalFailure, Result, TadbirError};
use crate::gate::{GateGuard, ResolveGate};
use crate::graph::{GraphShape, GraphValidator};
use crate::provider::{Provider, ProviderRegistry};
use crate::registry::{Registration, Registry};
use crate::resolver;
use crate::settings::ContainerSettings;
use crate::token::Token;

/// Identifies a scope within its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "root scope")
        } else {
            write!(f, "scope-{}", self.0)
        }
    }
}

/// State shared by every scope of one container.
struct Shared {
    settings: ContainerSettings,
    next_scope: AtomicU64,
}

/// Exactly-once cache cell for one `(scope, token)` pair.
pub(crate) enum Slot {
    Blocking(once_cell::sync::OnceCell<Instance>),
    #[cfg(feature = "async")]
    Awaitable(tokio::sync::OnceCell<Instance>),
}

/// A registration together with the scope whose registry holds it.
pub(crate) struct Found {
    pub registration: Arc<Registration>,
    pub owner: Arc<ScopeInner>,
}

enum Entry {
    Registration(Found),
    Alias(Token),
}

pub(crate) struct ScopeInner {
    id: ScopeId,
    parent: Option<Arc<ScopeInner>>,
    shared: Arc<Shared>,
    registry: RwLock<Registry>,
    instances: DashMap<Token, Arc<Slot>>,
    shapes: DashMap<Token, GraphShape>,
    disposables: DisposalTracker,
    gate: ResolveGate,
    children: Mutex<Vec<Weak<ScopeInner>>>,
}

impl ScopeInner {
    fn root(settings: ContainerSettings) -> Arc<Self> {
        let shared = Arc::new(Shared {
            settings,
            next_scope: AtomicU64::new(1),
        });
        Arc::new(Self::with(ScopeId::ROOT, None, shared))
    }

    fn with(id: ScopeId, parent: Option<Arc<ScopeInner>>, shared: Arc<Shared>) -> Self {
        Self {
            id,
            parent,
            shared,
            registry: RwLock::new(Registry::new()),
            instances: DashMap::new(),
            shapes: DashMap::new(),
            disposables: DisposalTracker::new(),
            gate: ResolveGate::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.shared.settings
    }

    /// Admits one operation on this scope.
    pub fn enter(&self) -> Result<GateGuard<'_>> {
        self.gate.enter().ok_or(TadbirError::ScopeDisposed { scope: self.id })
    }

    fn child(self: &Arc<Self>) -> Result<Arc<Self>> {
        let _guard = self.enter()?;

        let id = ScopeId(self.shared.next_scope.fetch_add(1, Ordering::Relaxed));
        let child = Arc::new(Self::with(id, Some(self.clone()), self.shared.clone()));

        let mut children = self.children.lock();
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child));

        debug!(scope = %id, parent = %self.id, "Created scope");
        Ok(child)
    }

    fn register(&self, token: Token, binding: ErasedBinding) -> Result<()> {
        let _guard = self.enter()?;
        let registration = Registration::new(token, binding);
        self.registry
            .write()
            .register(registration, self.shared.settings.duplicate_policy)
    }

    fn register_alias(&self, from: Token, to: Token) -> Result<()> {
        let _guard = self.enter()?;
        self.registry
            .write()
            .register_alias(from, to, self.shared.settings.duplicate_policy)
    }

    /// Finds the registration for `token`, nearest scope first.
    ///
    /// Aliases are followed one hop; the target is looked up from this
    /// scope again, so it may live in a different scope than the alias.
    pub fn lookup(self: &Arc<Self>, token: &Token) -> Option<Found> {
        match self.find(token)? {
            Entry::Registration(found) => Some(found),
            Entry::Alias(target) => match self.find(&target)? {
                Entry::Registration(found) => Some(found),
                Entry::Alias(_) => None,
            },
        }
    }

    fn find(self: &Arc<Self>, token: &Token) -> Option<Entry> {
        let mut scope = self;
        loop {
            {
                let registry = scope.registry.read();
                if let Some(registration) = registry.get(token) {
                    trace!(token = %token, owner = %scope.id, "Found registration");
                    return Some(Entry::Registration(Found {
                        registration: registration.clone(),
                        owner: scope.clone(),
                    }));
                }
                if let Some(target) = registry.alias_target(token) {
                    return Some(Entry::Alias(target.clone()));
                }
            }
            scope = scope.parent.as_ref()?;
        }
    }

    /// Tokens registered on this scope or any ancestor.
    pub fn visible_tokens(&self) -> Vec<Token> {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for scope in self.chain() {
            for token in scope.registry.read().tokens() {
                if seen.insert(token.clone()) {
                    tokens.push(token.clone());
                }
            }
        }
        tokens
    }

    fn chain(&self) -> impl Iterator<Item = &ScopeInner> {
        std::iter::successors(Some(self), |scope| scope.parent.as_deref())
    }

    /// Freezes this scope's registry and every ancestor's.
    ///
    /// A frozen scope always has frozen ancestors, so the walk stops at
    /// the first registry that is already frozen.
    pub fn freeze_chain(&self) {
        for scope in self.chain() {
            if scope.registry.read().is_frozen() {
                break;
            }
            scope.registry.write().freeze();
        }
    }

    fn is_frozen(&self) -> bool {
        self.registry.read().is_frozen()
    }

    /// Shape of the graph reachable from `token`, inspecting it on first
    /// use. A successful inspection freezes the scope chain, after which
    /// the shape can no longer change and is remembered.
    pub fn shape_of(self: &Arc<Self>, token: &Token) -> Result<GraphShape> {
        if let Some(shape) = self.shapes.get(token) {
            return Ok(*shape);
        }

        let shape = GraphValidator::new(self.settings()).inspect(self, token)?;
        self.freeze_chain();
        self.shapes.insert(token.clone(), shape);
        Ok(shape)
    }

    pub fn blocking_slot(&self, token: &Token) -> Arc<Slot> {
        self.slot(token, || Slot::Blocking(once_cell::sync::OnceCell::new()))
    }

    #[cfg(feature = "async")]
    pub fn awaitable_slot(&self, token: &Token) -> Arc<Slot> {
        self.slot(token, || Slot::Awaitable(tokio::sync::OnceCell::new()))
    }

    fn slot(&self, token: &Token, make: impl FnOnce() -> Slot) -> Arc<Slot> {
        if let Some(slot) = self.instances.get(token) {
            return slot.clone();
        }
        self.instances
            .entry(token.clone())
            .or_insert_with(|| Arc::new(make()))
            .clone()
    }

    /// Hands `instance` to this scope's disposal list if it has a teardown.
    pub fn track(&self, registration: &Registration, instance: &Instance) {
        self.disposables
            .track(&registration.token, instance, registration.teardown.as_ref());
    }

    fn live_children(&self) -> Vec<Arc<ScopeInner>> {
        let mut children = self.children.lock();
        children
            .drain(..)
            .rev()
            .filter_map(|weak| weak.upgrade())
            .collect()
    }

    #[instrument(skip_all, fields(scope = %self.id), name = "scope_dispose")]
    fn dispose(&self) -> std::result::Result<(), DisposalError> {
        if !self.gate.close() {
            trace!("Scope already disposed");
            return Ok(());
        }

        self.gate.wait_drained();
        let mut failures = Vec::new();
        for child in self.live_children() {
            if let Err(err) = child.dispose() {
                failures.extend(err.failures);
            }
        }
        self.finish(failures)
    }

    #[cfg(feature = "async")]
    fn dispose_async(self: Arc<Self>) -> BoxFuture<'static, std::result::Result<(), DisposalError>> {
        Box::pin(async move {
            if !self.gate.close() {
                trace!(scope = %self.id, "Scope already disposed");
                return Ok(());
            }

            self.gate.wait_drained_async().await;
            let mut failures = Vec::new();
            for child in self.live_children() {
                if let Err(err) = child.dispose_async().await {
                    failures.extend(err.failures);
                }
            }
            self.finish(failures)
        })
    }

    /// Runs this scope's own teardowns and drops its caches.
    fn finish(&self, mut failures: Vec<DisposalFailure>) -> std::result::Result<(), DisposalError> {
        if let Err(err) = self.disposables.dispose_all(self.id) {
            failures.extend(err.failures);
        }
        self.instances.clear();
        self.shapes.clear();

        info!(scope = %self.id, failures = failures.len(), "Scope disposed");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DisposalError {
                scope: self.id,
                failures,
            })
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if !self.gate.close() {
            return;
        }
        if let Err(err) = self.disposables.dispose_all(self.id) {
            warn!(scope = %self.id, error = %err, "Teardown failed while dropping scope");
        }
    }
}

/// Handle to a scope. Cloning is cheap and yields the same scope.
///
/// Scoped registrations are cached per scope; Singletons are cached in the
/// scope that owns their registration, which for base registrations is the
/// root scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub(crate) fn root(settings: ContainerSettings) -> Self {
        Self {
            inner: ScopeInner::root(settings),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<ScopeInner> {
        &self.inner
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn parent(&self) -> Option<Scope> {
        self.inner.parent.clone().map(|inner| Scope { inner })
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.gate.is_closed()
    }

    pub fn settings(&self) -> &ContainerSettings {
        self.inner.settings()
    }

    /// Registers a binding local to this scope. On a child scope it
    /// overrides any registration of the same token further up.
    ///
    /// # Errors
    /// [`TadbirError::RegistrationFrozen`] after this scope's first resolve,
    /// [`TadbirError::DuplicateRegistration`] per the duplicate policy,
    /// [`TadbirError::ScopeDisposed`] once disposed.
    pub fn register<T: Send + Sync + 'static>(
        &self,
        token: impl Into<Token>,
        binding: Binding<T>,
    ) -> Result<()> {
        self.inner.register(token.into(), binding.into())
    }

    /// Makes `from` resolve to whatever `to` resolves to, sharing its cache.
    pub fn alias(&self, from: impl Into<Token>, to: impl Into<Token>) -> Result<()> {
        self.inner.register_alias(from.into(), to.into())
    }

    /// Lets `provider` register its bindings on this scope.
    pub fn install(&self, provider: &dyn Provider) -> Result<()> {
        debug!(scope = %self.id(), provider = provider.name(), "Installing provider");
        let mut registry = self.clone();
        provider.register(&mut registry)
    }

    /// Makes this scope's registry and its ancestors' read-only.
    pub fn freeze(&self) {
        self.inner.freeze_chain();
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.is_frozen()
    }

    /// Creates a child scope whose lookups fall back to this one.
    pub fn create_scope(&self) -> Result<Scope> {
        Ok(Scope {
            inner: self.inner.child()?,
        })
    }

    /// Resolves `token` and downcasts the instance to `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self, token: impl Into<Token>) -> Result<Arc<T>> {
        let token = token.into();
        let instance = resolver::resolve_blocking(&self.inner, &token)?;
        downcast(&token, instance)
    }

    /// Resolves `token` without downcasting.
    pub fn resolve_any(&self, token: impl Into<Token>) -> Result<Instance> {
        resolver::resolve_blocking(&self.inner, &token.into())
    }

    /// Resolves the registration keyed by the type `T` itself.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve(Token::of::<T>())
    }

    /// Like [`resolve`](Self::resolve), but awaits async factories.
    #[cfg(feature = "async")]
    pub async fn resolve_async<T: Send + Sync + 'static>(
        &self,
        token: impl Into<Token>,
    ) -> Result<Arc<T>> {
        let token = token.into();
        let instance = resolver::resolve_awaitable(&self.inner, &token).await?;
        downcast(&token, instance)
    }

    #[cfg(feature = "async")]
    pub async fn resolve_any_async(&self, token: impl Into<Token>) -> Result<Instance> {
        resolver::resolve_awaitable(&self.inner, &token.into()).await
    }

    #[cfg(feature = "async")]
    pub async fn get_async<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_async(Token::of::<T>()).await
    }

    /// Checks every registration visible from this scope for unknown
    /// dependencies and cycles without running any factory.
    pub fn validate(&self) -> Result<()> {
        let _guard = self.inner.enter()?;
        GraphValidator::new(self.settings()).validate_all(&self.inner)
    }

    /// Disposes this scope: rejects new work, waits for in-flight resolves,
    /// disposes live child scopes, then tears down this scope's instances
    /// in reverse construction order.
    ///
    /// Calling it again is a no-op. Must not be called from a factory
    /// that is running in this scope.
    ///
    /// # Errors
    /// [`TadbirError::Disposal`] listing every teardown that failed,
    /// including those of child scopes.
    pub fn dispose(&self) -> Result<()> {
        Ok(self.inner.dispose()?)
    }

    /// Like [`dispose`](Self::dispose), but awaits in-flight resolves
    /// instead of blocking the thread.
    #[cfg(feature = "async")]
    pub async fn dispose_async(&self) -> Result<()> {
        Ok(self.inner.clone().dispose_async().await?)
    }

    /// Number of instances waiting for teardown in this scope.
    pub fn tracked_disposables(&self) -> usize {
        self.inner.disposables.len()
    }

    /// Whether both handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ProviderRegistry for Scope {
    fn register_erased(&mut self, token: Token, binding: ErasedBinding) -> Result<()> {
        self.inner.register(token, binding)
    }

    fn register_alias(&mut self, from: Token, to: Token) -> Result<()> {
        self.inner.register_alias(from, to)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent.as_ref().map(|p| p.id))
            .field("registered", &self.inner.registry.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::FactoryResult;
    use crate::disposal::Dispose;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Dispose for Recorder {
        fn dispose(&self) -> FactoryResult<()> {
            self.log.lock().push(self.name);
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Binding<Recorder> {
        let log = log.clone();
        Binding::scoped(move |_| {
            Ok(Recorder {
                name,
                log: log.clone(),
            })
        })
        .disposable()
    }

    fn root() -> Scope {
        Scope::root(ContainerSettings::default())
    }

    #[test]
    fn scope_ids_count_up_from_root() {
        let root = root();
        assert!(root.id().is_root());
        assert_eq!(root.id().to_string(), "root scope");

        let a = root.create_scope().unwrap();
        let b = a.create_scope().unwrap();
        assert_eq!(a.id().get(), 1);
        assert_eq!(b.id().to_string(), "scope-2");
        assert!(b.parent().unwrap().ptr_eq(&a));
        assert!(root.parent().is_none());
    }

    #[test]
    fn nearest_registration_wins() {
        let root = root();
        root.register("greeting", Binding::singleton(|_| Ok("hello"))).unwrap();

        let child = root.create_scope().unwrap();
        child.register("greeting", Binding::scoped(|_| Ok("hi"))).unwrap();

        let found = child.inner().lookup(&"greeting".into()).unwrap();
        assert_eq!(found.owner.id(), child.id());
        let found = root.inner().lookup(&"greeting".into()).unwrap();
        assert_eq!(found.owner.id(), ScopeId::ROOT);
    }

    #[test]
    fn alias_target_is_looked_up_through_the_chain() {
        let root = root();
        root.register("postgres", Binding::singleton(|_| Ok(5432u16))).unwrap();

        let child = root.create_scope().unwrap();
        child.alias("db", "postgres").unwrap();

        let found = child.inner().lookup(&"db".into()).unwrap();
        assert_eq!(found.registration.token, Token::symbol("postgres"));
        assert_eq!(found.owner.id(), ScopeId::ROOT);
        assert!(root.inner().lookup(&"db".into()).is_none());
    }

    #[test]
    fn visible_tokens_deduplicate_overrides() {
        let root = root();
        root.register("a", Binding::singleton(|_| Ok(1u8))).unwrap();
        root.register("b", Binding::singleton(|_| Ok(2u8))).unwrap();
        let child = root.create_scope().unwrap();
        child.register("a", Binding::scoped(|_| Ok(3u8))).unwrap();

        assert_eq!(child.inner().visible_tokens().len(), 2);
    }

    #[test]
    fn freezing_a_child_freezes_its_ancestors() {
        let root = root();
        let child = root.create_scope().unwrap();
        let sibling = root.create_scope().unwrap();

        child.freeze();
        assert!(child.is_frozen());
        assert!(root.is_frozen());
        assert!(!sibling.is_frozen());
        assert!(matches!(
            root.register("late", Binding::singleton(|_| Ok(()))),
            Err(TadbirError::RegistrationFrozen { .. })
        ));
    }

    #[test]
    fn disposed_scope_rejects_everything() {
        let root = root();
        let child = root.create_scope().unwrap();
        child.dispose().unwrap();

        assert!(child.is_disposed());
        assert!(matches!(child.create_scope(), Err(TadbirError::ScopeDisposed { .. })));
        assert!(matches!(
            child.register("x", Binding::scoped(|_| Ok(()))),
            Err(TadbirError::ScopeDisposed { .. })
        ));
        assert!(matches!(child.validate(), Err(TadbirError::ScopeDisposed { .. })));
        assert!(!root.is_disposed());
    }

    #[test]
    fn dispose_cascades_to_children_first() {
        let log = Arc::default();
        let root = root();
        root.register("outer", recorder("outer", &log)).unwrap();
        root.register("inner", recorder("inner", &log)).unwrap();

        let outer = root.create_scope().unwrap();
        let inner = outer.create_scope().unwrap();
        outer.resolve::<Recorder>("outer").unwrap();
        inner.resolve::<Recorder>("inner").unwrap();
        assert_eq!(outer.tracked_disposables(), 1);

        outer.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["inner", "outer"]);
        assert!(inner.is_disposed());

        outer.dispose().unwrap();
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn dropping_last_handle_runs_teardowns() {
        let log = Arc::default();
        let root = root();
        root.register("temp", recorder("temp", &log)).unwrap();

        let child = root.create_scope().unwrap();
        child.resolve::<Recorder>("temp").unwrap();
        drop(child);

        assert_eq!(*log.lock(), vec!["temp"]);
    }

    #[test]
    fn provider_installs_into_scope() {
        struct Greetings;

        impl Provider for Greetings {
            fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
                registry.bind("hello", Binding::singleton(|_| Ok("hello")))?;
                registry.register_alias("hi".into(), "hello".into())
            }
        }

        let root = root();
        root.install(&Greetings).unwrap();
        assert_eq!(*root.resolve::<&str>("hi").unwrap(), "hello");
    }

    #[test]
    fn debug_output_names_the_scope() {
        let child = root().create_scope().unwrap();
        let debug = format!("{child:?}");
        assert!(debug.contains("Scope"));
        assert!(debug.contains("disposed: false"));
    }
}
