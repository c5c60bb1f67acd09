//! End-to-end behaviour of the container through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use tadbir::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Config {
    url: String,
}

struct Db {
    config: Arc<Config>,
}

struct Repo {
    db: Arc<Db>,
}

fn request_graph() -> Container {
    Container::builder()
        .register("config", Binding::singleton(|_| Ok(Config { url: "x".into() })))
        .register("db", Binding::singleton(|deps| Ok(Db { config: deps.at(0)? })).depends_on(["config"]))
        .register("repo", Binding::scoped(|deps| Ok(Repo { db: deps.at(0)? })).depends_on(["db"]))
        .build()
        .unwrap()
}

#[test]
fn repository_per_scope_database_per_container() {
    init_tracing();
    let container = request_graph();

    let scope1 = container.create_scope().unwrap();
    let repo_a: Arc<Repo> = scope1.resolve("repo").unwrap();
    let repo_b: Arc<Repo> = scope1.resolve("repo").unwrap();
    assert!(Arc::ptr_eq(&repo_a, &repo_b));

    let scope2 = container.create_scope().unwrap();
    let repo_c: Arc<Repo> = scope2.resolve("repo").unwrap();
    assert!(!Arc::ptr_eq(&repo_c, &repo_a));
    assert!(Arc::ptr_eq(&repo_c.db, &repo_a.db));
    assert_eq!(repo_c.db.config.url, "x");
}

#[test]
fn singleton_is_shared_across_nested_scopes() {
    let container = request_graph();
    let outer = container.create_scope().unwrap();
    let inner = outer.create_scope().unwrap();

    let from_root: Arc<Db> = container.resolve("db").unwrap();
    let from_inner: Arc<Db> = inner.resolve("db").unwrap();
    assert!(Arc::ptr_eq(&from_root, &from_inner));

    let outer_repo: Arc<Repo> = outer.resolve("repo").unwrap();
    let inner_repo: Arc<Repo> = inner.resolve("repo").unwrap();
    assert!(!Arc::ptr_eq(&outer_repo, &inner_repo));
}

#[test]
fn transient_is_always_new() {
    let container = Container::new();
    container.register("id", Binding::transient(|_| Ok(String::from("req")))).unwrap();

    let a = container.resolve_any("id").unwrap();
    let b = container.resolve_any("id").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn three_step_cycle_fails_deterministically() {
    let container = Container::new();
    container.register("A", Binding::transient(|_| Ok(())).depends_on(["B"])).unwrap();
    container.register("B", Binding::transient(|_| Ok(())).depends_on(["C"])).unwrap();
    container.register("C", Binding::transient(|_| Ok(())).depends_on(["A"])).unwrap();

    for _ in 0..3 {
        match container.resolve_any("A").unwrap_err() {
            TadbirError::CircularDependency(err) => {
                assert_eq!(err.chain.first(), err.chain.last());
                assert_eq!(err.chain.len(), 4);
                assert!(err.to_string().contains("A → B → C → A"), "{err}");
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }
}

#[test]
fn unknown_token_leaves_container_untouched() {
    let container = Container::new();
    container.register("config", Binding::singleton(|_| Ok(1u8))).unwrap();

    assert!(matches!(container.resolve_any("nope"), Err(TadbirError::UnknownToken(_))));
    assert!(!container.is_frozen());

    // Still open for registration
    container.register("nope", Binding::singleton(|_| Ok(2u8))).unwrap();
    assert_eq!(*container.resolve::<u8>("nope").unwrap(), 2);
}

struct Closeable {
    name: String,
    closed: Arc<Mutex<Vec<String>>>,
}

impl Dispose for Closeable {
    fn dispose(&self) -> FactoryResult<()> {
        self.closed.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}

#[test]
fn dispose_tears_down_once_in_reverse_creation_order() {
    init_tracing();
    let closed: Arc<Mutex<Vec<String>>> = Arc::default();
    let container = Container::new();
    for (name, deps) in [("first", vec![]), ("second", vec!["first"]), ("third", vec!["second"])] {
        let closed = closed.clone();
        container
            .register(
                name,
                Binding::scoped(move |_| {
                    Ok(Closeable {
                        name: name.to_string(),
                        closed: closed.clone(),
                    })
                })
                .depends_on(deps)
                .disposable(),
            )
            .unwrap();
    }

    let scope = container.create_scope().unwrap();
    scope.resolve_any("third").unwrap();
    scope.resolve_any("third").unwrap();
    container.dispose_scope(&scope).unwrap();
    container.dispose_scope(&scope).unwrap();

    assert_eq!(*closed.lock().unwrap(), vec!["third", "second", "first"]);
    assert!(matches!(scope.resolve_any("first"), Err(TadbirError::ScopeDisposed { .. })));
}

#[test]
fn disposal_error_lists_every_failure() {
    struct Stubborn(&'static str);

    impl Dispose for Stubborn {
        fn dispose(&self) -> FactoryResult<()> {
            Err(format!("{} is still busy", self.0).into())
        }
    }

    let container = Container::new();
    container.register("a", Binding::scoped(|_| Ok(Stubborn("a"))).disposable()).unwrap();
    container.register("b", Binding::scoped(|_| Ok(Stubborn("b"))).disposable()).unwrap();

    let scope = container.create_scope().unwrap();
    scope.resolve_any("a").unwrap();
    scope.resolve_any("b").unwrap();

    let err = container.dispose_scope(&scope).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("2 teardown"), "{rendered}");
    assert!(rendered.contains("a is still busy"), "{rendered}");
    assert!(rendered.contains("b is still busy"), "{rendered}");
}

#[test]
fn hundred_concurrent_first_resolutions_construct_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .register(
            "expensive",
            Binding::singleton({
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(5));
                    Ok(vec![0u8; 1024])
                }
            }),
        )
        .unwrap();

    let barrier = Barrier::new(100);
    let results: Vec<Arc<Vec<u8>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..100)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    container.resolve::<Vec<u8>>("expensive").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
}

#[test]
fn providers_install_into_builder_and_scopes() {
    struct Defaults;

    impl Provider for Defaults {
        fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
            registry.bind("locale", Binding::scoped(|_| Ok(String::from("en"))))
        }
    }

    struct German;

    impl Provider for German {
        fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
            registry.bind("locale", Binding::scoped(|_| Ok(String::from("de"))))
        }
    }

    let container = Container::builder().add_provider(Defaults).build().unwrap();
    let berlin = container.create_scope().unwrap();
    berlin.install(&German).unwrap();

    assert_eq!(*berlin.resolve::<String>("locale").unwrap(), "de");
    assert_eq!(*container.create_scope().unwrap().resolve::<String>("locale").unwrap(), "en");
}

#[test]
fn replace_policy_lets_the_last_registration_win() {
    let container = Container::with_settings(ContainerSettings {
        duplicate_policy: DuplicatePolicy::Replace,
        ..ContainerSettings::default()
    });
    container.register("n", Binding::singleton(|_| Ok(1u8))).unwrap();
    container.register("n", Binding::singleton(|_| Ok(2u8))).unwrap();
    assert_eq!(*container.resolve::<u8>("n").unwrap(), 2);
}

#[cfg(feature = "async")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_factories_resolve_through_the_facade() {
    init_tracing();
    let container = Arc::new(Container::new());
    container
        .register(
            "pool",
            Binding::singleton_async(|deps| async move {
                let url: Arc<String> = deps.at(0)?;
                tokio::task::yield_now().await;
                Ok::<_, BoxError>(format!("pool({url})"))
            })
            .depends_on(["url"]),
        )
        .unwrap();
    container.register("url", Binding::instance(String::from("pg://db"))).unwrap();

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let container = container.clone();
            tokio::spawn(async move {
                let scope = container.create_scope()?;
                Ok::<_, TadbirError>(scope.resolve_async::<String>("pool").await?)
            })
        })
        .collect();

    let mut pools = Vec::new();
    for task in tasks {
        pools.push(task.await.unwrap().unwrap());
    }
    assert_eq!(*pools[0], "pool(pg://db)");
    assert!(pools.iter().all(|p| Arc::ptr_eq(p, &pools[0])));

    container.dispose_async().await.unwrap();
    assert!(container.root().is_disposed());
}
