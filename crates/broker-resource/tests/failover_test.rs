//! Failover behavior of resource groups driven by scripted health checks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use broker_core::config::BrokerConfig;
use broker_core::error::{BrokerError, ErrorKind};
use broker_core::result::BrokerResult;
use broker_core::traits::PollingMethod;
use broker_resource::{PollingRegistry, ResourceGroup};

/// Poll result controlled by the test.
#[derive(Debug)]
struct Scripted(Arc<AtomicBool>);

#[async_trait]
impl PollingMethod for Scripted {
    async fn poll(&self) -> BrokerResult<bool> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

/// One switch per resource, looked up through the `switch` attribute.
#[derive(Clone, Default)]
struct Switches(Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>);

impl Switches {
    fn get(&self, name: &str) -> Arc<AtomicBool> {
        let mut map = self.0.lock().unwrap();
        Arc::clone(
            map.entry(name.to_string())
                .or_insert_with(|| Arc::new(AtomicBool::new(true))),
        )
    }

    fn set(&self, name: &str, live: bool) {
        self.get(name).store(live, Ordering::SeqCst);
    }

    fn registry(&self) -> PollingRegistry {
        let switches = self.clone();
        let mut registry = PollingRegistry::new();
        registry.register("scripted", move |_, attrs| {
            let name = attrs.get_str("switch").unwrap_or_default();
            Ok(Arc::new(Scripted(switches.get(&name))) as Arc<dyn PollingMethod>)
        });
        registry.register("refused", |_, _| Ok(Arc::new(Refused) as Arc<dyn PollingMethod>));
        registry
    }
}

/// Always fails, as an unreachable backend would.
#[derive(Debug)]
struct Refused;

#[async_trait]
impl PollingMethod for Refused {
    async fn poll(&self) -> BrokerResult<bool> {
        Err(BrokerError::storage("connection refused"))
    }
}

/// One captured log event.
#[derive(Debug, Clone)]
struct Captured {
    level: Level,
    message: String,
    error: Option<String>,
}

/// Records every event emitted while installed.
#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<Captured>>>);

#[derive(Default)]
struct EventVisitor {
    message: String,
    error: Option<String>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "error" => self.error = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        self.0.lock().unwrap().push(Captured {
            level: *event.metadata().level(),
            message: visitor.message,
            error: visitor.error,
        });
    }
}

impl CapturedEvents {
    fn matching(&self, text: &str) -> Vec<Captured> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.message.contains(text))
            .cloned()
            .collect()
    }

    fn levels(&self, text: &str) -> Vec<Level> {
        self.matching(text).into_iter().map(|e| e.level).collect()
    }
}

fn ldap_pool(interval_seconds: u64, notice_level: &str) -> BrokerConfig {
    BrokerConfig::from_toml(&format!(
        r#"
        [[resource_groups]]
        id = "ldap-pool"
        interval_seconds = {interval_seconds}
        critical_notice_level = "{notice_level}"

        [[resource_groups.resources]]
        id = "primary"
        cost = 0
        [resource_groups.resources.polling]
        method = "scripted"
        interval_seconds = 3600
        [resource_groups.resources.attributes]
        switch = "primary"

        [[resource_groups.resources]]
        id = "secondary"
        cost = 10
        [resource_groups.resources.polling]
        method = "scripted"
        interval_seconds = 3600
        [resource_groups.resources.attributes]
        switch = "secondary"
        "#
    ))
    .unwrap()
}

async fn check_all(group: &ResourceGroup) {
    for resource in group.resources() {
        resource.check_now().await;
    }
}

#[tokio::test]
async fn test_ldap_pool_failover_scenario() {
    let switches = Switches::default();
    let config = ldap_pool(60, "warning");
    let group = ResourceGroup::init(&config.resource_groups[0], &switches.registry()).unwrap();

    assert_eq!(group.get_active_resource().unwrap().id(), "primary");

    switches.set("primary", false);
    check_all(&group).await;
    group.refresh();
    assert_eq!(group.get_active_resource().unwrap().id(), "secondary");

    switches.set("secondary", false);
    check_all(&group).await;
    group.refresh();
    let err = group.get_active_resource().unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoResourceActive);

    switches.set("primary", true);
    check_all(&group).await;
    group.refresh();
    assert_eq!(group.get_active_resource().unwrap().id(), "primary");

    group.destroy();
}

#[tokio::test]
async fn test_empty_pool_logs_once_per_refresh_at_configured_level() {
    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let switches = Switches::default();
    let config = ldap_pool(60, "error");
    let group = ResourceGroup::init(&config.resource_groups[0], &switches.registry()).unwrap();
    assert!(events.levels("No live resources").is_empty());

    switches.set("primary", false);
    switches.set("secondary", false);
    check_all(&group).await;

    group.refresh();
    assert_eq!(events.levels("No live resources"), vec![Level::ERROR]);

    group.refresh();
    assert_eq!(
        events.levels("No live resources"),
        vec![Level::ERROR, Level::ERROR]
    );

    switches.set("secondary", true);
    check_all(&group).await;
    group.refresh();
    assert_eq!(events.levels("No live resources").len(), 2);

    group.destroy();
}

#[tokio::test]
async fn test_background_refresh_applies_failover() {
    let switches = Switches::default();
    let config = ldap_pool(1, "warn");
    let group = ResourceGroup::init(&config.resource_groups[0], &switches.registry()).unwrap();
    assert_eq!(group.get_active_resource().unwrap().id(), "primary");

    switches.set("primary", false);
    check_all(&group).await;
    assert_eq!(group.get_active_resource().unwrap().id(), "primary");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(group.get_active_resource().unwrap().id(), "secondary");

    group.destroy();
}

#[tokio::test]
async fn test_destroy_interrupts_sleeping_workers() {
    let switches = Switches::default();
    let config = ldap_pool(3600, "warn");
    let group = ResourceGroup::init(&config.resource_groups[0], &switches.registry()).unwrap();
    tokio::task::yield_now().await;
    assert!(group.is_refreshing());
    assert!(group.resources().iter().all(|r| r.is_polling()));

    group.destroy();
    group.destroy();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!group.is_refreshing());
    assert!(group.resources().iter().all(|r| !r.is_polling() && !r.live()));
    assert_eq!(
        group.get_active_resource().unwrap_err().kind,
        ErrorKind::NoResourceActive
    );
}

#[tokio::test]
async fn test_snapshot_readers_see_complete_lists_during_refresh() {
    let switches = Switches::default();
    let config = ldap_pool(60, "warn");
    let group = ResourceGroup::init(&config.resource_groups[0], &switches.registry()).unwrap();

    let reader = {
        let group = Arc::clone(&group);
        tokio::spawn(async move {
            for _ in 0..500 {
                let snapshot = group.active_resources();
                let costs: Vec<i32> = snapshot.iter().map(|r| r.cost()).collect();
                let mut sorted = costs.clone();
                sorted.sort_unstable();
                assert_eq!(costs, sorted);
                tokio::task::yield_now().await;
            }
        })
    };

    for round in 0..100 {
        switches.set("primary", round % 2 == 0);
        check_all(&group).await;
        group.refresh();
        tokio::task::yield_now().await;
    }

    reader.await.unwrap();
    group.destroy();
}

#[tokio::test]
async fn test_first_failed_poll_warns_with_error() {
    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = BrokerConfig::from_toml(
        r#"
        [[resource_groups]]
        id = "ldap-pool"
        interval_seconds = 60

        [[resource_groups.resources]]
        id = "primary"
        [resource_groups.resources.polling]
        method = "refused"
        interval_seconds = 3600
        "#,
    )
    .unwrap();
    let group =
        ResourceGroup::init(&config.resource_groups[0], &Switches::default().registry()).unwrap();
    let resource = Arc::clone(&group.resources()[0]);

    for _ in 0..3 {
        assert!(!resource.check_now().await);
    }

    let warnings = events.matching("Resource is no longer live");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::WARN);
    assert!(
        warnings[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused"))
    );
    assert!(events.levels("Health check still failing").len() >= 2);
    assert!(
        events
            .levels("Health check still failing")
            .iter()
            .all(|level| *level == Level::DEBUG)
    );

    group.destroy();
}
