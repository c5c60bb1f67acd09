//! # Tadbir — Dependency Injection Container for Rust
//!
//! A thread-safe IoC container: declarative registrations keyed by tokens,
//! Singleton / Scoped / Transient lifecycles, nested scopes, cycle
//! detection and ordered teardown of disposable instances.
//!
//! ```
//! use std::sync::Arc;
//! use tadbir::prelude::*;
//!
//! struct Config { url: String }
//! struct Database { config: Arc<Config> }
//!
//! let container = Container::builder()
//!     .register("config", Binding::singleton(|_| Ok(Config { url: "x".into() })))
//!     .register("db", Binding::singleton(|deps| Ok(Database { config: deps.at(0)? })).depends_on(["config"]))
//!     .build()?;
//!
//! let request = container.create_scope()?;
//! let db: Arc<Database> = request.resolve("db")?;
//! assert_eq!(db.config.url, "x");
//! request.dispose()?;
//! # Ok::<(), TadbirError>(())
//! ```

pub use tadbir_container::*;
pub use tadbir_support::*;
