//! Registry: stores the registrations of one scope.
//!
//! Maps [`Token`] to the [`Registration`] that knows how to build it.
//! The root scope's registry is the container's base registry; child
//! scopes hold local overrides. A registry becomes read-only once frozen.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::binding::{ErasedBinding, Factory, Teardown};
use crate::error::{DuplicateRegistrationError, Result, TadbirError};
use crate::lifecycle::Lifecycle;
use crate::settings::DuplicatePolicy;
use crate::token::Token;

/// Registration entry for a single token.
pub(crate) struct Registration {
    pub token: Token,
    pub lifecycle: Lifecycle,
    pub dependencies: Vec<Token>,
    pub factory: Factory,
    pub teardown: Option<Teardown>,
    pub produces: &'static str,
}

impl Registration {
    pub fn new(token: Token, binding: ErasedBinding) -> Self {
        Self {
            token,
            lifecycle: binding.lifecycle,
            dependencies: binding.dependencies,
            factory: binding.factory,
            teardown: binding.teardown,
            produces: binding.produces,
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("token", &self.token)
            .field("lifecycle", &self.lifecycle)
            .field("dependencies", &self.dependencies)
            .field("produces", &self.produces)
            .finish()
    }
}

/// Registrations and aliases of one scope.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    registrations: HashMap<Token, Arc<Registration>>,
    aliases: HashMap<Token, Token>,
    frozen: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a registration.
    ///
    /// # Errors
    /// [`TadbirError::RegistrationFrozen`] once frozen;
    /// [`TadbirError::DuplicateRegistration`] if the token is taken and
    /// the policy is [`DuplicatePolicy::Reject`].
    pub fn register(&mut self, registration: Registration, policy: DuplicatePolicy) -> Result<()> {
        let token = registration.token.clone();
        self.ensure_writable(&token, policy)?;

        debug!(token = %token, lifecycle = %registration.lifecycle, "Registered binding");
        self.aliases.remove(&token);
        self.registrations.insert(token, Arc::new(registration));
        Ok(())
    }

    /// Registers an alias: resolving `from` resolves `to` instead.
    pub fn register_alias(&mut self, from: Token, to: Token, policy: DuplicatePolicy) -> Result<()> {
        self.ensure_writable(&from, policy)?;

        debug!(from = %from, to = %to, "Registered alias");
        self.registrations.remove(&from);
        self.aliases.insert(from, to);
        Ok(())
    }

    pub fn get(&self, token: &Token) -> Option<&Arc<Registration>> {
        self.registrations.get(token)
    }

    pub fn alias_target(&self, token: &Token) -> Option<&Token> {
        let target = self.aliases.get(token);
        if let Some(to) = target {
            trace!(from = %token, to = %to, "Following alias");
        }
        target
    }

    pub fn freeze(&mut self) {
        if !self.frozen {
            debug!(registered = self.registrations.len(), "Registry frozen");
            self.frozen = true;
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Registered tokens and alias tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.registrations.keys().chain(self.aliases.keys())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    fn ensure_writable(&self, token: &Token, policy: DuplicatePolicy) -> Result<()> {
        if self.frozen {
            return Err(TadbirError::RegistrationFrozen { token: token.clone() });
        }

        let taken = self.registrations.contains_key(token) || self.aliases.contains_key(token);
        if taken && policy == DuplicatePolicy::Reject {
            return Err(TadbirError::DuplicateRegistration(DuplicateRegistrationError {
                token: token.clone(),
            }));
        }
        Ok(())
    }
}
