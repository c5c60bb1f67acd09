//! Container settings.
//!
//! [`ContainerSettings`] is plain data and implements serde's traits so a
//! host can embed it in its own configuration format. Every field has a
//! default, so partial documents deserialize.

use serde::{Deserialize, Serialize};

/// What happens when a token is registered twice in the same registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateRegistration`.
    #[default]
    Reject,
    /// Last write wins.
    Replace,
}

/// Behaviour switches shared by a container and all of its scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    pub duplicate_policy: DuplicatePolicy,
    /// Validate the whole dependency graph in `ContainerBuilder::build`.
    pub validate_on_build: bool,
    /// Reject registrations that declare a shorter-lived dependency than
    /// themselves (e.g. a Singleton depending on a Transient).
    pub reject_captive_dependencies: bool,
    /// Track teardowns of Transient instances in the scope that resolved them.
    pub track_transient_disposables: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            validate_on_build: true,
            reject_captive_dependencies: false,
            track_transient_disposables: false,
        }
    }
}
