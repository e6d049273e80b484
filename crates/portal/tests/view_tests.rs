//! Integration tests for `PortalContext` and `ExecutionView` against a
//! local stand-in server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use srs_client::routes::{BuildPath, ExecutionPath};
use srs_core::status::ExecutionStatus;
use srs_poller::{PollEvent, PollOutcome};
use srs_portal::{PortalConfig, PortalContext};

const EXECUTION: &str = "/api/v1/centers/ihtsdo/extensions/int/products/nlp/builds/b1/executions/e1";

// ---------------------------------------------------------------------------
// Stand-in server
// ---------------------------------------------------------------------------

/// Serves execution `e1`. Each GET takes the next scripted status; the last
/// one repeats. Triggering replaces the script.
#[derive(Default)]
struct Server {
    statuses: Mutex<VecDeque<&'static str>>,
    gets: AtomicUsize,
    triggers: AtomicUsize,
}

impl Server {
    fn scripted(statuses: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            ..Self::default()
        })
    }

    fn next_status(&self) -> &'static str {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().copied().unwrap()
        }
    }
}

fn execution_json(status: &str) -> Value {
    json!({
        "id": "e1",
        "creationTime": "2014-03-31T09:30:23",
        "status": status,
    })
}

async fn get_execution(State(server): State<Arc<Server>>) -> Json<Value> {
    server.gets.fetch_add(1, Ordering::SeqCst);
    Json(execution_json(server.next_status()))
}

async fn trigger_execution(State(server): State<Arc<Server>>) -> Json<Value> {
    server.triggers.fetch_add(1, Ordering::SeqCst);
    *server.statuses.lock().unwrap() = VecDeque::from(["BUILDING", "BUILT"]);
    Json(execution_json("QUEUED"))
}

async fn current_user(headers: HeaderMap) -> Json<Value> {
    let authenticated = headers.contains_key("authorization");
    Json(json!({ "authenticated": authenticated, "username": authenticated.then_some("tok") }))
}

async fn context_for(server: Arc<Server>) -> PortalContext {
    let router = Router::new()
        .route(EXECUTION, get(get_execution))
        .route(&format!("{EXECUTION}/trigger"), post(trigger_execution))
        .route("/api/v1/user", get(current_user))
        .with_state(server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut config = PortalConfig {
        api_url: format!("http://{addr}/api/v1"),
        ..PortalConfig::default()
    };
    config.poll.interval = Duration::from_millis(10);
    PortalContext::new(config).unwrap()
}

fn execution_path() -> ExecutionPath {
    BuildPath::new("ihtsdo", "int", "nlp", "b1").execution("e1")
}

async fn wait_for(rx: &mut tokio::sync::watch::Receiver<ExecutionStatus>, target: ExecutionStatus) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|status| *status == target))
        .await
        .expect("status not reached in time")
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: activation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn opened_view_does_not_poll_until_activated() {
    let server = Server::scripted(&["BEFORE_TRIGGER"]);
    let ctx = context_for(server.clone()).await;

    let view = ctx.open_execution(execution_path()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(view.status(), ExecutionStatus::BeforeTrigger);
    assert_eq!(server.gets.load(Ordering::SeqCst), 1);
    assert!(!view.is_active().await);
}

#[tokio::test]
async fn activated_view_follows_execution_until_built() {
    let server = Server::scripted(&["BEFORE_TRIGGER", "QUEUED", "BUILDING", "BUILT"]);
    let ctx = context_for(server.clone()).await;

    let view = ctx.open_execution(execution_path()).await.unwrap();
    let mut rx = view.subscribe();
    view.activate().await;

    wait_for(&mut rx, ExecutionStatus::Built).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(server.gets.load(Ordering::SeqCst), 4, "open plus three polls");
    assert!(!view.is_active().await);
    assert!(!view.is_stale());
}

#[tokio::test]
async fn deactivated_view_receives_no_further_writes() {
    let server = Server::scripted(&["QUEUED", "BUILDING"]);
    let ctx = context_for(server.clone()).await;

    let view = ctx.open_execution(execution_path()).await.unwrap();
    let mut rx = view.subscribe();
    view.activate().await;
    wait_for(&mut rx, ExecutionStatus::Building).await;

    assert!(view.deactivate().await);
    let gets = server.gets.load(Ordering::SeqCst);
    let _ = rx.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(server.gets.load(Ordering::SeqCst) <= gets + 1);
    assert!(!rx.has_changed().unwrap());
    assert!(!view.deactivate().await, "already inactive");
}

// ---------------------------------------------------------------------------
// Test: trigger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trigger_posts_and_starts_polling() {
    let server = Server::scripted(&["BEFORE_TRIGGER"]);
    let ctx = context_for(server.clone()).await;

    let mut view = ctx.open_execution(execution_path()).await.unwrap();
    let mut rx = view.subscribe();
    assert!(!view.execution().is_triggered());

    let execution = view.trigger().await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Queued);

    wait_for(&mut rx, ExecutionStatus::Built).await;
    assert_eq!(server.triggers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn trigger_keeps_the_running_session() {
    let server = Server::scripted(&["BEFORE_TRIGGER"]);
    let ctx = context_for(server.clone()).await;
    let mut events = ctx.poller.subscribe();

    let mut view = ctx.open_execution(execution_path()).await.unwrap();
    let mut rx = view.subscribe();
    assert!(view.activate().await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    view.trigger().await.unwrap();
    wait_for(&mut rx, ExecutionStatus::Built).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut outcomes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PollEvent::Finished { outcome, .. } = event {
            outcomes.push(outcome);
        }
    }
    assert_eq!(outcomes, [PollOutcome::Terminal(ExecutionStatus::Built)]);
}

#[tokio::test]
async fn activation_after_shutdown_is_refused() {
    let server = Server::scripted(&["QUEUED"]);
    let ctx = context_for(server.clone()).await;
    let view = ctx.open_execution(execution_path()).await.unwrap();

    ctx.poller.shutdown().await;

    assert!(!view.activate().await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.gets.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test: session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authenticate_without_credentials_is_anonymous() {
    let ctx = context_for(Server::scripted(&["QUEUED"])).await;

    let user = ctx.authenticate().await.unwrap();

    assert!(!user.authenticated);
    assert!(!ctx.api.session().is_authenticated());
}
