//! Dependency lifecycles.
//!
//! A lifecycle determines how long a resolved instance is shared:
//! - [`Lifecycle::Singleton`]: one instance per container
//! - [`Lifecycle::Scoped`]: one instance per scope (e.g., per unit of work)
//! - [`Lifecycle::Transient`]: a new instance every time
//!
//! # Ordering
//! Lifecycles are ordered by lifetime: `Singleton > Scoped > Transient`.
use std::fmt;

/// Sharing policy of a registration.
///
/// # Examples
/// ```
/// use tadbir_container::lifecycle::Lifecycle;
///
/// assert!(Lifecycle::Singleton > Lifecycle::Scoped);
/// assert!(Lifecycle::Scoped > Lifecycle::Transient);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// One instance shared across the whole container.
    ///
    /// Constructed on first resolve and cached in the scope that owns the
    /// registration (the root scope for container-level registrations).
    /// Torn down when that scope is disposed.
    Singleton,

    /// One instance per scope.
    ///
    /// Constructed on first resolve within a scope, torn down together
    /// with that scope.
    Scoped,

    /// New instance on every resolve.
    ///
    /// Never cached. The caller owns the instance, so it is not tracked
    /// for disposal unless the container is configured to.
    Transient,
}

impl Lifecycle {
    /// Returns `true` if instances of this lifecycle are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifecycle::Singleton | Lifecycle::Scoped)
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifecycle::Singleton)
    }

    /// Higher = longer lived.
    #[inline]
    fn rank(&self) -> u8 {
        match self {
            Lifecycle::Singleton => 2,
            Lifecycle::Scoped => 1,
            Lifecycle::Transient => 0,
        }
    }
}

impl PartialOrd for Lifecycle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifecycle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Singleton => write!(f, "Singleton"),
            Lifecycle::Scoped => write!(f, "Scoped"),
            Lifecycle::Transient => write!(f, "Transient"),
        }
    }
}
