//! Basic example of the Tadbir DI container.

use std::sync::Arc;

use tadbir::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Dispose for Database {
    fn dispose(&self) -> FactoryResult<()> {
        self.logger.log(&format!("Closing connection to {}", self.url));
        Ok(())
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

struct Mailer {
    relay: String,
}

/// Mail wiring kept in its own module.
struct MailProvider;

impl Provider for MailProvider {
    fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
        registry.bind(
            "mailer",
            Binding::singleton_async(|_| async {
                // e.g. a TLS handshake with the relay
                tokio::task::yield_now().await;
                Ok::<_, BoxError>(Mailer {
                    relay: "smtp://relay.local".to_string(),
                })
            }),
        )
    }
}

fn logger(deps: &Dependencies, index: usize) -> Result<Arc<dyn Logger>> {
    let logger: Arc<Arc<dyn Logger>> = deps.at(index)?;
    Ok(Arc::clone(&*logger))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("tadbir_container=debug")
        .init();

    // Build the container
    let container = Container::builder()
        // Config: singleton value (already created)
        .singleton_value(Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        })
        // Logger: singleton
        .register("logger", Binding::singleton(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)))
        // Database: singleton (depends on Config + Logger), closed on dispose
        .register(
            "db",
            Binding::singleton(|deps| {
                let config: Arc<Config> = deps.at(0)?;
                Ok(Database {
                    url: config.database_url.clone(),
                    logger: logger(&deps, 1)?,
                })
            })
            .depends_on([Token::of::<Config>(), "logger".into()])
            .disposable(),
        )
        // UserRepository: scoped (one per request)
        .register(
            "users.repo",
            Binding::scoped(|deps| Ok(UserRepository { db: deps.at(0)? })).depends_on(["db"]),
        )
        // UserService: transient (new each time)
        .register(
            "users.service",
            Binding::transient(|deps| {
                Ok(UserService {
                    repo: deps.at(0)?,
                    logger: logger(&deps, 1)?,
                })
            })
            .depends_on(["users.repo", "logger"]),
        )
        .add_provider(MailProvider)
        .build()?;

    println!("✅ Container built successfully!");
    println!("{container:?}");

    // === Resolve from the root scope ===
    let config: Arc<Config> = container.get()?;
    println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

    // === Create a scope (e.g., for an HTTP request) ===
    let request = container.create_scope()?;

    let service: Arc<UserService> = request.resolve("users.service")?;
    println!("👤 {}", service.get_user(42));

    // Resolve again in the same scope; UserRepository is reused
    let again: Arc<UserService> = request.resolve("users.service")?;
    println!("👤 {}", again.get_user(7));
    println!("🔁 same repository: {}", Arc::ptr_eq(&service.repo, &again.repo));

    container.dispose_scope(&request)?;

    // === Async factories ===
    let mailer: Arc<Mailer> = container.resolve_async("mailer").await?;
    println!("📮 Mail relay: {}", mailer.relay);

    // === Errors carry hints ===
    if let Err(err) = container.resolve_any("user.repo") {
        println!("❌ {err}");
    }

    // Tears down the Database singleton
    container.dispose()?;

    println!("\n🎉 Everything works!");
    Ok(())
}
