//! Error types for Tadbir container operations.
//!
//! Every error names the tokens involved and, where it helps, a hint on
//! how to fix the registration.

use std::fmt;

use tadbir_support::rendering::{render_bullets, render_chain};

use crate::lifecycle::Lifecycle;
use crate::scope::ScopeId;
use crate::token::Token;

/// Error type produced by user factories and teardowns.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Tadbir operations.
#[derive(Debug, thiserror::Error)]
pub enum TadbirError {
    /// No registration is reachable for the requested token.
    #[error("{}", .0)]
    UnknownToken(UnknownTokenError),

    /// The declared dependency graph contains a cycle.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A long-lived registration declares a shorter-lived dependency.
    /// Only reported when `reject_captive_dependencies` is enabled.
    #[error("{}", .0)]
    CaptiveDependency(CaptiveDependencyError),

    /// Token already registered and the duplicate policy is `Reject`.
    #[error("{}", .0)]
    DuplicateRegistration(DuplicateRegistrationError),

    /// Registry was frozen by `freeze()` or the first resolve.
    #[error(
        "Cannot register {token}: registry is frozen\n  Hint: register every binding before the first resolve() or freeze()"
    )]
    RegistrationFrozen { token: Token },

    /// Operation attempted on a scope that has been disposed.
    #[error("{scope} has been disposed")]
    ScopeDisposed { scope: ScopeId },

    /// A user factory returned an error.
    #[error("Failed to construct {token}: {source}")]
    FactoryFailed {
        token: Token,
        #[source]
        source: BoxError,
    },

    /// The resolved instance is not of the requested type.
    #[error("Type mismatch for {token}: expected {expected}")]
    TypeMismatch { token: Token, expected: &'static str },

    /// A blocking resolve reached an async factory.
    #[error(
        "{token} needs an async factory to construct\n  Hint: resolve it with resolve_async()"
    )]
    AsyncResolutionRequired { token: Token },

    /// A factory asked for a dependency it never declared.
    #[error(
        "Dependency {requested} is not among the {declared} declared dependencies\n  Hint: add it to .depends_on([...])"
    )]
    UndeclaredDependency { requested: String, declared: usize },

    /// One or more teardowns failed while disposing a scope.
    #[error("{}", .0)]
    Disposal(DisposalError),
}

/// Error when a token has no reachable registration.
#[derive(Debug)]
pub struct UnknownTokenError {
    pub requested: Token,
    /// The registration that declared the missing dependency, if any.
    pub required_by: Option<Token>,
    /// Registered labels that look like the requested one.
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnknownTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No registration for {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:{}", render_bullets(&self.suggestions, 4))?;
        }

        write!(
            f,
            "\n  Hint: register {} on the container or on an enclosing scope",
            self.requested.label()
        )
    }
}

/// Error when the declared dependency graph has a cycle.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Path that closes the cycle, e.g. `[A, B, C, A]`.
    pub chain: Vec<Token>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.chain.iter().map(Token::label).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&labels))?;
        write!(
            f,
            "\n  Hint: break the cycle by resolving one side lazily or restructuring the graph"
        )
    }
}

/// A longer-lived consumer declares a shorter-lived dependency.
#[derive(Debug)]
pub struct CaptiveDependencyError {
    pub dependency: Token,
    pub dependency_lifecycle: Lifecycle,
    pub consumer: Token,
    pub consumer_lifecycle: Lifecycle,
}

impl fmt::Display for CaptiveDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Captive dependency: {} ({}) depends on {} ({})",
            self.consumer, self.consumer_lifecycle, self.dependency, self.dependency_lifecycle,
        )?;
        write!(
            f,
            "\n  Hint: make {} {} or longer-lived",
            self.dependency.label(),
            self.consumer_lifecycle,
        )
    }
}

/// Error when a token is registered twice under the `Reject` policy.
#[derive(Debug)]
pub struct DuplicateRegistrationError {
    pub token: Token,
}

impl fmt::Display for DuplicateRegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token already registered: {}", self.token)?;
        write!(
            f,
            "\n  Hint: use allow_override(true) or DuplicatePolicy::Replace to overwrite"
        )
    }
}

/// A single failed teardown.
#[derive(Debug)]
pub struct DisposalFailure {
    pub scope: ScopeId,
    pub token: Token,
    pub source: BoxError,
}

/// All teardown failures collected while disposing a scope (and the child
/// scopes disposed with it).
#[derive(Debug)]
pub struct DisposalError {
    pub scope: ScopeId,
    pub failures: Vec<DisposalFailure>,
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .failures
            .iter()
            .map(|failure| format!("{} in {}: {}", failure.token.label(), failure.scope, failure.source))
            .collect();
        write!(
            f,
            "{} teardown(s) failed while disposing {}:{}",
            self.failures.len(),
            self.scope,
            render_bullets(&lines, 2)
        )
    }
}

impl std::error::Error for DisposalError {}

impl From<DisposalError> for TadbirError {
    fn from(err: DisposalError) -> Self {
        TadbirError::Disposal(err)
    }
}

/// Convenient Result type for Tadbir operations.
pub type Result<T> = std::result::Result<T, TadbirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_token_display() {
        let err = TadbirError::UnknownToken(UnknownTokenError {
            requested: Token::symbol("confg"),
            required_by: Some(Token::symbol("db")),
            suggestions: vec!["config".to_string()],
        });

        let msg = err.to_string();
        assert!(msg.contains("No registration for \"confg\""));
        assert!(msg.contains("Required by: \"db\""));
        assert!(msg.contains("- config"));
    }

    #[test]
    fn circular_dependency_display() {
        let err = TadbirError::CircularDependency(CircularDependencyError {
            chain: vec![
                Token::symbol("A"),
                Token::symbol("B"),
                Token::symbol("C"),
                Token::symbol("A"),
            ],
        });

        let msg = err.to_string();
        assert!(msg.contains("Circular"));
        assert!(msg.contains("A → B → C → A"));
    }

    #[test]
    fn captive_dependency_display() {
        let err = TadbirError::CaptiveDependency(CaptiveDependencyError {
            dependency: Token::of::<String>(),
            dependency_lifecycle: Lifecycle::Transient,
            consumer: Token::of::<Vec<u8>>(),
            consumer_lifecycle: Lifecycle::Singleton,
        });

        let msg = err.to_string();
        assert!(msg.contains("Captive dependency"));
        assert!(msg.contains("Singleton"));
        assert!(msg.contains("Transient"));
    }

    #[test]
    fn factory_failure_keeps_source() {
        use std::error::Error as _;

        let err = TadbirError::FactoryFailed {
            token: Token::symbol("db"),
            source: "connection refused".into(),
        };

        assert!(err.to_string().contains("connection refused"));
        assert!(err.source().is_some());
    }

    #[test]
    fn disposal_error_lists_every_failure() {
        let err = TadbirError::from(DisposalError {
            scope: ScopeId::ROOT,
            failures: vec![
                DisposalFailure {
                    scope: ScopeId::ROOT,
                    token: Token::symbol("db"),
                    source: "flush failed".into(),
                },
                DisposalFailure {
                    scope: ScopeId::ROOT,
                    token: Token::symbol("cache"),
                    source: "already closed".into(),
                },
            ],
        });

        let msg = err.to_string();
        assert!(msg.starts_with("2 teardown(s) failed"));
        assert!(msg.contains("db in root scope: flush failed"));
        assert!(msg.contains("cache in root scope: already closed"));
    }
}
