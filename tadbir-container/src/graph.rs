//! Dependency graph inspection.
//!
//! Walks the *declared* dependency tokens reachable from a token and
//! reports, before any factory runs:
//! - tokens with no reachable registration
//! - cycles, with the full path
//! - captive dependencies (opt-in)
//!
//! The walk uses the same lookup and context switch as the resolver:
//! a Singleton's dependencies are looked up from the scope that owns the
//! Singleton's registration. Objects that factories wire to each other at
//! runtime are invisible here; only declared edges count.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tadbir_support::rendering::suggest_similar;
use tracing::{debug, instrument, warn};

use crate::error::{
    CaptiveDependencyError, CircularDependencyError, Result, TadbirError, UnknownTokenError,
};
use crate::registry::Registration;
use crate::scope::{ScopeId, ScopeInner};
use crate::settings::ContainerSettings;
use crate::token::Token;

const MAX_SUGGESTIONS: usize = 3;

/// What the resolver needs to know about a token's graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct GraphShape {
    /// Some registration in the graph has an async factory.
    pub has_async: bool,
}

/// Depth-first walk with a visiting set for cycle detection.
pub(crate) struct GraphValidator {
    reject_captive: bool,
    /// Currently on the DFS path
    visiting: HashSet<Token>,
    /// Finished nodes, keyed by the scope their dependencies were looked up in
    inspected: HashMap<(ScopeId, Token), GraphShape>,
    /// Current DFS path, for error reporting
    path: Vec<Token>,
}

impl GraphValidator {
    pub fn new(settings: &ContainerSettings) -> Self {
        Self {
            reject_captive: settings.reject_captive_dependencies,
            visiting: HashSet::new(),
            inspected: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// Inspects the graph reachable from `token` as seen from `scope`.
    pub fn inspect(&mut self, scope: &Arc<ScopeInner>, token: &Token) -> Result<GraphShape> {
        self.visit(scope, token, None)
    }

    /// Inspects every token registered on `scope` and its ancestors.
    #[instrument(skip_all, fields(scope = %scope.id()), name = "graph_validation")]
    pub fn validate_all(&mut self, scope: &Arc<ScopeInner>) -> Result<()> {
        let tokens = scope.visible_tokens();
        debug!(tokens = tokens.len(), "Validating dependency graph");

        for token in &tokens {
            self.visit(scope, token, None)?;
        }

        debug!("Dependency graph validation passed");
        Ok(())
    }

    fn visit(
        &mut self,
        scope: &Arc<ScopeInner>,
        token: &Token,
        consumer: Option<&Registration>,
    ) -> Result<GraphShape> {
        let found = scope.lookup(token).ok_or_else(|| self.unknown(scope, token))?;
        let registration = found.registration;
        let canonical = &registration.token;

        if let Some(consumer) = consumer {
            self.check_captive(consumer, &registration)?;
        }

        if self.visiting.contains(canonical) {
            let start = self.path.iter().position(|t| t == canonical).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(canonical.clone());

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(TadbirError::CircularDependency(CircularDependencyError { chain }));
        }

        let context = if registration.lifecycle.is_singleton() {
            found.owner
        } else {
            scope.clone()
        };
        let key = (context.id(), canonical.clone());
        if let Some(shape) = self.inspected.get(&key) {
            return Ok(*shape);
        }

        self.visiting.insert(canonical.clone());
        self.path.push(canonical.clone());

        let mut shape = GraphShape {
            has_async: registration.factory.is_async(),
        };
        for dependency in &registration.dependencies {
            let nested = self.visit(&context, dependency, Some(&registration))?;
            shape.has_async |= nested.has_async;
        }

        self.path.pop();
        self.visiting.remove(canonical);
        self.inspected.insert(key, shape);

        Ok(shape)
    }

    /// A consumer must not outlive what it depends on.
    fn check_captive(&self, consumer: &Registration, dependency: &Registration) -> Result<()> {
        if !self.reject_captive || consumer.lifecycle <= dependency.lifecycle {
            return Ok(());
        }

        warn!(
            consumer = %consumer.token,
            consumer_lifecycle = %consumer.lifecycle,
            dependency = %dependency.token,
            dependency_lifecycle = %dependency.lifecycle,
            "Captive dependency detected"
        );
        Err(TadbirError::CaptiveDependency(CaptiveDependencyError {
            consumer: consumer.token.clone(),
            consumer_lifecycle: consumer.lifecycle,
            dependency: dependency.token.clone(),
            dependency_lifecycle: dependency.lifecycle,
        }))
    }

    fn unknown(&self, scope: &Arc<ScopeInner>, token: &Token) -> TadbirError {
        unknown_token(scope, token, self.path.last())
    }
}

/// Builds an [`UnknownTokenError`] with "did you mean?" suggestions drawn
/// from the tokens visible to `scope`.
pub(crate) fn unknown_token(
    scope: &ScopeInner,
    token: &Token,
    required_by: Option<&Token>,
) -> TadbirError {
    let labels: Vec<String> = scope.visible_tokens().iter().map(Token::label).collect();
    let available: Vec<&str> = labels.iter().map(String::as_str).collect();

    TadbirError::UnknownToken(UnknownTokenError {
        requested: token.clone(),
        required_by: required_by.cloned(),
        suggestions: suggest_similar(&token.label(), &available, MAX_SUGGESTIONS),
    })
}
