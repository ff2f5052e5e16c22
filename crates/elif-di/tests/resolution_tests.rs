//! Integration tests for service resolution
//!
//! Covers scope identity, optional lookups, the two construction strategies
//! and their behaviour in dependency cycles, shared dependencies in larger
//! graphs and scope compatibility.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use elif_di::{
    ClassInjectable, Container, DiError, FactoryInjectable, Inject, ServiceDependency, ServiceId,
    ServiceInfo,
};

/// Greeting service trait
trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

#[derive(Default)]
struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {}", name)
    }
}

#[derive(Default)]
struct SpanishGreeter;

impl Greeter for SpanishGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Hola, {}", name)
    }
}

#[derive(Default)]
struct Counter;

#[tokio::test]
async fn test_singleton_returns_same_instance() {
    let mut container = Container::new();
    container
        .register(ClassInjectable::<Counter, Counter>::new().service(ServiceInfo::new()))
        .unwrap();

    let first = container.get::<Counter>().await.unwrap();
    let second = container.get::<Counter>().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_transient_returns_distinct_instances() {
    let mut container = Container::new();
    container
        .register(ClassInjectable::<Counter, Counter>::new().service(ServiceInfo::new().transient()))
        .unwrap();

    let first = container.get::<Counter>().await.unwrap();
    let second = container.get::<Counter>().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!container.is_cached(&ServiceId::of::<Counter>()));
}

#[tokio::test]
async fn test_missing_service_required_vs_optional() {
    let container = Container::new();

    let err = container.get::<Counter>().await.err().unwrap();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Counter"));

    assert!(container.get_optional::<Counter>().await.unwrap().is_none());
    assert!(container
        .get_optional_named::<Counter>("missing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_trait_object_interfaces_and_names() {
    let mut container = Container::new();
    container
        .register(
            ClassInjectable::<dyn Greeter, EnglishGreeter>::with_interface(|g| g)
                .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<dyn Greeter, SpanishGreeter>::with_interface(|g| g)
                .service(ServiceInfo::new().named("es")),
        )
        .unwrap();

    let english = container.get::<dyn Greeter>().await.unwrap();
    let spanish = container.get_named::<dyn Greeter>("es").await.unwrap();
    assert_eq!(english.greet("Ada"), "Hello, Ada");
    assert_eq!(spanish.greet("Ada"), "Hola, Ada");

    let err = container.get_named::<dyn Greeter>("fr").await.err().unwrap();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("registered names: default, es"));
}

#[tokio::test]
async fn test_last_registration_wins() {
    let mut container = Container::new();
    container
        .register(
            ClassInjectable::<dyn Greeter, EnglishGreeter>::with_interface(|g| g)
                .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<dyn Greeter, SpanishGreeter>::with_interface(|g| g)
                .service(ServiceInfo::new()),
        )
        .unwrap();

    let greeter = container.get::<dyn Greeter>().await.unwrap();
    assert_eq!(greeter.greet("Bo"), "Hola, Bo");
    assert_eq!(container.iter_service::<dyn Greeter>().unwrap().len(), 1);
}

#[tokio::test]
async fn test_resolve_with_mismatched_type_is_not_found() {
    let mut container = Container::new();
    container.define(Arc::new(8080u16)).unwrap();

    let err = container
        .resolve::<u32>(ServiceDependency::of::<u16>())
        .await
        .err()
        .unwrap();
    assert!(err.is_not_found());
    assert_eq!(
        *container
            .resolve::<u16>(ServiceDependency::of::<u16>())
            .await
            .unwrap()
            .unwrap(),
        8080
    );
}

struct Alpha;
struct Beta;

#[tokio::test]
async fn test_factory_cycle_is_a_dependency_loop() {
    let mut container = Container::new();
    container
        .register(
            FactoryInjectable::<Alpha>::new(|deps| async move {
                deps.get::<Beta>("beta")?;
                Ok(Arc::new(Alpha))
            })
            .depends_on::<Beta>("beta")
            .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            FactoryInjectable::<Beta>::new(|deps| async move {
                deps.get::<Alpha>("alpha")?;
                Ok(Arc::new(Beta))
            })
            .depends_on::<Alpha>("alpha")
            .service(ServiceInfo::new()),
        )
        .unwrap();

    let err = container.get::<Alpha>().await.err().unwrap();
    match &err {
        DiError::DependencyLoop { path, service } => {
            assert!(path.contains("Alpha(default)"));
            assert!(path.contains("Beta(default)"));
            assert!(service.contains("Alpha"));
        }
        other => panic!("expected a dependency loop, got {:?}", other),
    }

    assert!(!container.is_cached(&ServiceId::of::<Alpha>()));
    assert!(!container.is_cached(&ServiceId::of::<Beta>()));
}

#[derive(Default)]
struct Left {
    right: Inject<Right>,
}

#[derive(Default)]
struct Right {
    left: Inject<Left>,
}

#[tokio::test]
async fn test_class_cycle_resolves_to_consistent_pair() {
    let mut container = Container::new();
    container
        .register(
            ClassInjectable::<Left, Left>::new()
                .inject::<Right>("right", |l| &l.right)
                .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<Right, Right>::new()
                .inject::<Left>("left", |r| &r.left)
                .service(ServiceInfo::new()),
        )
        .unwrap();

    let left = container.get::<Left>().await.unwrap();
    let right = container.get::<Right>().await.unwrap();

    assert!(Arc::ptr_eq(left.right.get().unwrap(), &right));
    assert!(Arc::ptr_eq(right.left.get().unwrap(), &left));
}

#[tokio::test]
async fn test_transient_class_cycle_is_a_dependency_loop() {
    let mut container = Container::new();
    container
        .register(
            ClassInjectable::<Left, Left>::new()
                .inject::<Right>("right", |l| &l.right)
                .service(ServiceInfo::new().transient()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<Right, Right>::new()
                .inject::<Left>("left", |r| &r.left)
                .service(ServiceInfo::new().transient()),
        )
        .unwrap();

    assert!(container.get::<Left>().await.err().unwrap().is_dependency_loop());
    assert!(container.validate().is_err());
}

struct Settings;
struct Pool;

struct UserRepository {
    settings: Arc<Settings>,
    pool: Arc<Pool>,
}

struct OrderRepository {
    settings: Arc<Settings>,
    pool: Arc<Pool>,
}

struct Checkout {
    users: Arc<UserRepository>,
    orders: Arc<OrderRepository>,
}

struct Application {
    checkout: Arc<Checkout>,
    settings: Arc<Settings>,
}

#[tokio::test]
async fn test_shared_dependencies_in_larger_graph() {
    let settings_built = Arc::new(AtomicUsize::new(0));
    let pool_built = Arc::new(AtomicUsize::new(0));

    let mut container = Container::new();

    let counter = settings_built.clone();
    container
        .register(
            FactoryInjectable::<Settings>::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Arc::new(Settings)) }
            })
            .service(ServiceInfo::new()),
        )
        .unwrap();

    let counter = pool_built.clone();
    container
        .register(
            FactoryInjectable::<Pool>::blocking(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Pool))
            })
            .service(ServiceInfo::new()),
        )
        .unwrap();

    container
        .register(
            FactoryInjectable::<UserRepository>::new(|deps| async move {
                Ok(Arc::new(UserRepository {
                    settings: deps.get("settings")?,
                    pool: deps.get("pool")?,
                }))
            })
            .depends_on::<Settings>("settings")
            .depends_on::<Pool>("pool")
            .service(ServiceInfo::new()),
        )
        .unwrap();

    container
        .register(
            FactoryInjectable::<OrderRepository>::new(|deps| async move {
                Ok(Arc::new(OrderRepository {
                    settings: deps.get("settings")?,
                    pool: deps.get("pool")?,
                }))
            })
            .depends_on::<Settings>("settings")
            .depends_on::<Pool>("pool")
            .service(ServiceInfo::new()),
        )
        .unwrap();

    container
        .register(
            FactoryInjectable::<Checkout>::new(|deps| async move {
                Ok(Arc::new(Checkout {
                    users: deps.get("users")?,
                    orders: deps.get("orders")?,
                }))
            })
            .depends_on::<UserRepository>("users")
            .depends_on::<OrderRepository>("orders")
            .service(ServiceInfo::new()),
        )
        .unwrap();

    container
        .register(
            FactoryInjectable::<Application>::new(|deps| async move {
                Ok(Arc::new(Application {
                    checkout: deps.get("checkout")?,
                    settings: deps.get("settings")?,
                }))
            })
            .depends_on::<Checkout>("checkout")
            .depends_on::<Settings>("settings")
            .service(ServiceInfo::new()),
        )
        .unwrap();

    assert!(container.validate().is_ok());

    let app = container.get::<Application>().await.unwrap();
    let users = &app.checkout.users;
    let orders = &app.checkout.orders;

    assert!(Arc::ptr_eq(&users.settings, &orders.settings));
    assert!(Arc::ptr_eq(&users.settings, &app.settings));
    assert!(Arc::ptr_eq(&users.pool, &orders.pool));
    assert_eq!(settings_built.load(Ordering::SeqCst), 1);
    assert_eq!(pool_built.load(Ordering::SeqCst), 1);
    assert_eq!(container.statistics().cached_instances, 6);
}

#[derive(Default)]
struct Session;

#[derive(Default)]
struct Widget {
    session: Inject<Session>,
}

#[derive(Default)]
struct Page {
    session: Inject<Session>,
    widget: Inject<Widget>,
}

#[tokio::test]
async fn test_dependent_scope_shared_within_one_request() {
    let mut container = Container::new();
    container
        .register(ClassInjectable::<Session, Session>::new().service(ServiceInfo::new().dependent()))
        .unwrap();
    container
        .register(
            ClassInjectable::<Widget, Widget>::new()
                .inject::<Session>("session", |w| &w.session)
                .service(ServiceInfo::new().transient()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<Page, Page>::new()
                .inject::<Session>("session", |p| &p.session)
                .inject::<Widget>("widget", |p| &p.widget)
                .service(ServiceInfo::new().transient()),
        )
        .unwrap();

    let first = container.get::<Page>().await.unwrap();
    let second = container.get::<Page>().await.unwrap();

    assert!(Arc::ptr_eq(
        first.session.get().unwrap(),
        first.widget.session.get().unwrap()
    ));
    assert!(!Arc::ptr_eq(
        first.session.get().unwrap(),
        second.session.get().unwrap()
    ));
}

#[tokio::test]
async fn test_singleton_cannot_depend_on_shorter_lived_service() {
    let mut container = Container::new();
    container
        .register(ClassInjectable::<Session, Session>::new().service(ServiceInfo::new().transient()))
        .unwrap();

    let err = container
        .register(
            ClassInjectable::<Widget, Widget>::new()
                .inject::<Session>("session", |w| &w.session)
                .service(ServiceInfo::new()),
        )
        .unwrap_err();
    assert!(err.is_scope_mismatch());
    assert!(err.to_string().contains("singleton"));
    assert!(err.to_string().contains("transient"));
}

#[tokio::test]
async fn test_scope_checked_when_dependency_registered_later() {
    let mut container = Container::new();
    container
        .register(
            ClassInjectable::<Widget, Widget>::new()
                .inject::<Session>("session", |w| &w.session)
                .service(ServiceInfo::new()),
        )
        .unwrap();

    let err = container
        .register(ClassInjectable::<Session, Session>::new().service(ServiceInfo::new().dependent()))
        .unwrap_err();
    assert!(err.is_scope_mismatch());
}

#[tokio::test]
async fn test_transient_may_depend_on_singleton() {
    let mut container = Container::new();
    container
        .register(ClassInjectable::<Session, Session>::new().service(ServiceInfo::new()))
        .unwrap();
    container
        .register(
            ClassInjectable::<Widget, Widget>::new()
                .inject::<Session>("session", |w| &w.session)
                .service(ServiceInfo::new().transient()),
        )
        .unwrap();

    let a = container.get::<Widget>().await.unwrap();
    let b = container.get::<Widget>().await.unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(a.session.get().unwrap(), b.session.get().unwrap()));
}

#[derive(Default)]
struct Mailer {
    audit: Inject<dyn Greeter>,
}

#[tokio::test]
async fn test_optional_dependencies() {
    let mut container = Container::new();
    container
        .register(
            ClassInjectable::<Mailer, Mailer>::new()
                .inject_optional::<dyn Greeter>("audit", |m| &m.audit)
                .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            FactoryInjectable::<String>::new(|deps| async move {
                let label = match deps.get_optional::<u16>("port") {
                    Some(port) => format!("port {}", port),
                    None => "no port".to_string(),
                };
                Ok(Arc::new(label))
            })
            .depends_on_optional::<u16>("port")
            .service(ServiceInfo::new()),
        )
        .unwrap();

    let mailer = container.get::<Mailer>().await.unwrap();
    assert!(!mailer.audit.is_injected());
    assert_eq!(*container.get::<String>().await.unwrap(), "no port");
}

#[tokio::test]
async fn test_missing_required_dependency_fails_and_unwinds() {
    let mut container = Container::new();
    container
        .register(
            ClassInjectable::<Widget, Widget>::new()
                .inject::<Session>("session", |w| &w.session)
                .service(ServiceInfo::new()),
        )
        .unwrap();

    assert!(container.get::<Widget>().await.err().unwrap().is_not_found());
    assert!(!container.is_cached(&ServiceId::of::<Widget>()));

    let errors = container.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("required by"));

    container
        .register(ClassInjectable::<Session, Session>::new().service(ServiceInfo::new()))
        .unwrap();
    assert!(container.get::<Widget>().await.unwrap().session.is_injected());
}

struct Slow;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_access_builds_singleton_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();

    let mut container = Container::new();
    container
        .register(
            FactoryInjectable::<Slow>::new(move |_| {
                let counter = counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Slow))
                }
            })
            .service(ServiceInfo::new()),
        )
        .unwrap();
    let container = Arc::new(container);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let container = container.clone();
        handles.push(tokio::spawn(async move { container.get::<Slow>().await }));
    }

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}


#[derive(Default)]
struct Repository {
    pool: Inject<Pool>,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_access_sees_populated_instance() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();

    let mut container = Container::new();
    container
        .register(
            FactoryInjectable::<Pool>::new(|_| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(Arc::new(Pool))
            })
            .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<Repository, Repository>::new()
                .inject::<Pool>("pool", |r| &r.pool)
                .on_init_blocking(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .service(ServiceInfo::new()),
        )
        .unwrap();
    let container = Arc::new(container);

    let first = {
        let container = container.clone();
        tokio::spawn(async move { container.get::<Repository>().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let mut handles = vec![first];
    for _ in 0..8 {
        let container = container.clone();
        handles.push(tokio::spawn(async move {
            let repository = container.get::<Repository>().await?;
            assert!(repository.pool.is_injected());
            Ok::<_, DiError>(repository)
        }));
    }

    let mut instances: Vec<Arc<Repository>> = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|r| r.pool.is_injected()));
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[derive(Default)]
struct Handler {
    repository: Inject<Repository>,
}

#[tokio::test]
async fn test_singleton_built_under_dependent_is_shared() {
    let mut container = Container::new();
    container
        .register(
            FactoryInjectable::<Pool>::new(|_| async { Ok(Arc::new(Pool)) })
                .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<Repository, Repository>::new()
                .inject::<Pool>("pool", |r| &r.pool)
                .service(ServiceInfo::new()),
        )
        .unwrap();
    container
        .register(
            ClassInjectable::<Handler, Handler>::new()
                .inject::<Repository>("repository", |h| &h.repository)
                .service(ServiceInfo::new().dependent()),
        )
        .unwrap();

    let first = container.get::<Handler>().await.unwrap();
    assert!(container.is_cached(&ServiceId::of::<Repository>()));
    assert!(container.is_cached(&ServiceId::of::<Pool>()));

    let second = container.get::<Handler>().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(
        first.repository.get().unwrap(),
        second.repository.get().unwrap()
    ));
}
