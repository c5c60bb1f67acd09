//! Disposal coordinator: teardown of instances when their scope ends.
//!
//! Each scope owns a [`DisposalTracker`]. Instances whose binding carries a
//! teardown are appended as they are constructed; disposing the scope runs
//! the teardowns in reverse construction order, so an instance is torn down
//! before the instances it was built from.

use std::mem;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::binding::{FactoryResult, Instance, Teardown};
use crate::error::{DisposalError, DisposalFailure};
use crate::scope::ScopeId;
use crate::token::Token;

/// A value that releases resources when its owning scope is disposed.
///
/// Opt a binding in with [`Binding::disposable`](crate::binding::Binding::disposable).
///
/// ```
/// use tadbir_container::prelude::*;
///
/// struct Pool;
///
/// impl Dispose for Pool {
///     fn dispose(&self) -> FactoryResult<()> {
///         Ok(())
///     }
/// }
///
/// let binding = Binding::singleton(|_| Ok(Pool)).disposable();
/// # let _ = binding;
/// ```
pub trait Dispose: Send + Sync {
    fn dispose(&self) -> FactoryResult<()>;
}

struct Tracked {
    token: Token,
    instance: Instance,
    teardown: Teardown,
}

/// Ordered list of pending teardowns for one scope.
#[derive(Default)]
pub(crate) struct DisposalTracker {
    tracked: Mutex<Vec<Tracked>>,
}

impl DisposalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `instance` if it has a teardown; no-op otherwise.
    pub fn track(&self, token: &Token, instance: &Instance, teardown: Option<&Teardown>) {
        let Some(teardown) = teardown else {
            return;
        };

        trace!(token = %token, "Tracking disposable");
        self.tracked.lock().push(Tracked {
            token: token.clone(),
            instance: instance.clone(),
            teardown: teardown.clone(),
        });
    }

    /// Runs every pending teardown, newest first, and clears the list.
    ///
    /// A failing teardown does not stop the others. Calling this again
    /// afterwards is a no-op.
    pub fn dispose_all(&self, scope: ScopeId) -> Result<(), DisposalError> {
        let pending = mem::take(&mut *self.tracked.lock());
        let mut failures = Vec::new();

        for tracked in pending.into_iter().rev() {
            trace!(scope = %scope, token = %tracked.token, "Disposing");
            if let Err(source) = (tracked.teardown)(&tracked.instance) {
                warn!(scope = %scope, token = %tracked.token, error = %source, "Teardown failed");
                failures.push(DisposalFailure {
                    scope,
                    token: tracked.token,
                    source,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DisposalError { scope, failures })
        }
    }

    pub fn len(&self) -> usize {
        self.tracked.lock().len()
    }
}
