#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{path_str, policy_root, wait_until};
use futures_util::future::join_all;
use pdp_core::error::PdpError;
use pdp_core::rules::RuleEngine;
use pdp_core::{Evaluable, PolicyEngine};
use pdp_server::obs::trace;
use pdp_server::{config, run, RunningServer, Server};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn start(root: &Path) -> RunningServer {
    let engine: Arc<dyn PolicyEngine> = Arc::new(RuleEngine::new());
    let mut server = Server::new(root, engine).unwrap();
    server.load_policy(&path_str(root, "a.yaml")).unwrap();
    server.listen_requests("127.0.0.1:0").await.unwrap();
    server.listen_control("127.0.0.1:0").await.unwrap();
    server.start(trace::disabled()).unwrap()
}

fn cfg_yaml(root: &Path, policy: &str, service: &str, control: &str) -> String {
    format!(
        "version: 1\nserver:\n  root: {:?}\n  policy: {:?}\n  service_listen: {:?}\n  control_listen: {:?}\n",
        root.to_string_lossy(),
        policy,
        service,
        control
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decisions_during_sequential_updates() {
    let dir = policy_root();
    let srv = start(dir.path()).await;
    let client = reqwest::Client::new();

    let decide_url = format!("http://{}/v1/decide", srv.request_addr());
    let policy_url = format!("http://{}/v1/policy", srv.control_addr());

    let decisions = (0..100).map(|i| {
        let client = client.clone();
        let url = decide_url.clone();
        async move {
            let resp = client
                .post(&url)
                .json(&json!({ "attributes": { "subject": format!("user-{i}") } }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
            resp.json::<Value>().await.unwrap()
        }
    });

    let store = srv.store();
    let updates = async {
        for (n, effect) in [(1u64, "deny"), (2, "permit"), (3, "deny")] {
            let body = json!({ "id": format!("p{n}"), "policy": format!("id: p{n}\ndefault: {effect}\n") });
            let resp = client.post(&policy_url).json(&body).send().await.unwrap();
            assert_eq!(resp.status(), 202);
            let ack: Value = resp.json().await.unwrap();
            assert_eq!(ack["seq"], n);

            let store = Arc::clone(&store);
            wait_until(move || store.version() == n + 1).await;
        }
    };

    let (results, ()) = tokio::join!(join_all(decisions), updates);

    assert_eq!(results.len(), 100);
    for body in &results {
        let policy = body["policy"].as_str().unwrap();
        assert!(["a", "p1", "p2", "p3"].contains(&policy), "{body}");
        let expected = if policy == "a" || policy == "p2" { "permit" } else { "deny" };
        assert_eq!(body["effect"], expected, "{body}");
    }

    assert_eq!(srv.store().version(), 4);
    assert_eq!(srv.store().get().handle.id(), "p3");
    let status = srv.status();
    wait_until(move || status.last_applied().map(|u| u.seq) == Some(3)).await;

    drop(client);
    srv.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_plane_survives_control_plane_stop() {
    let dir = policy_root();
    let mut srv = start(dir.path()).await;

    let decide_url = format!("http://{}/v1/decide", srv.request_addr());
    let policy_url = format!("http://{}/v1/policy", srv.control_addr());

    srv.stop_control().await;

    let client = reqwest::Client::new();
    let resp = client
        .post(&decide_url)
        .json(&json!({ "attributes": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let refused = client
        .post(&policy_url)
        .json(&json!({ "id": "b", "path": "b.yaml" }))
        .send()
        .await;
    assert!(refused.is_err());

    drop(client);
    srv.shutdown().await.unwrap();
}

#[tokio::test]
async fn control_plane_survives_request_plane_stop() {
    let dir = policy_root();
    let mut srv = start(dir.path()).await;

    let decide_url = format!("http://{}/v1/decide", srv.request_addr());
    let policy_url = format!("http://{}/v1/policy", srv.control_addr());

    srv.stop_requests().await;

    let client = reqwest::Client::new();
    let refused = client
        .post(&decide_url)
        .json(&json!({ "attributes": {} }))
        .send()
        .await;
    assert!(refused.is_err());

    let resp = client
        .post(&policy_url)
        .json(&json!({ "id": "b", "path": "b.yaml" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    let store = srv.store();
    wait_until(move || store.version() == 2).await;
    assert_eq!(srv.store().get().handle.id(), "b");

    let ready = client
        .get(format!("http://{}/readyz", srv.control_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), 200);

    drop(client);
    srv.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_applies_everything_accepted() {
    let dir = policy_root();
    let srv = start(dir.path()).await;
    let request_addr = srv.request_addr();

    let client = reqwest::Client::new();
    let policy_url = format!("http://{}/v1/policy", srv.control_addr());
    for i in 0..10 {
        let body = json!({ "id": format!("u{i}"), "policy": format!("id: u{i}\ndefault: deny\n") });
        let resp = client.post(&policy_url).json(&body).send().await.unwrap();
        assert_eq!(resp.status(), 202);
    }
    drop(client);

    let store = srv.store();
    let queue = srv.queue();
    let metrics = srv.metrics();
    srv.shutdown().await.unwrap();

    assert!(metrics.is_draining());
    assert!(queue.is_empty());
    assert_eq!(store.version(), 11);
    assert_eq!(store.get().handle.id(), "u9");
    assert_eq!(metrics.updates.get(&[("outcome", "applied")]), 10);

    // request plane is closed last, but it is closed
    let late = reqwest::Client::new()
        .post(format!("http://{request_addr}/v1/decide"))
        .json(&json!({ "attributes": {} }))
        .send()
        .await;
    assert!(late.is_err());
}

#[tokio::test]
async fn control_bind_failure_is_fatal() {
    let dir = policy_root();
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken_addr = taken.local_addr().unwrap().to_string();

    let engine: Arc<dyn PolicyEngine> = Arc::new(RuleEngine::new());
    let mut server = Server::new(dir.path(), engine).unwrap();
    server.load_policy(&path_str(dir.path(), "a.yaml")).unwrap();
    server.listen_requests("127.0.0.1:0").await.unwrap();
    let err = server.listen_control(&taken_addr).await.unwrap_err();
    assert!(matches!(err, PdpError::Bind { ref addr, .. } if *addr == taken_addr));
    assert_eq!(err.client_code().as_str(), "INTERNAL");

    // the aggregate refuses to start without a control port
    assert!(server.start(trace::disabled()).is_err());

    // same through the full startup path; never waits for the shutdown signal
    let cfg = config::load_from_str(&cfg_yaml(
        dir.path(),
        &path_str(dir.path(), "a.yaml"),
        "127.0.0.1:0",
        &taken_addr,
    ))
    .unwrap();
    let res = tokio::time::timeout(
        Duration::from_secs(5),
        run(cfg, std::future::pending::<()>()),
    )
    .await
    .expect("run returns instead of serving");
    assert!(matches!(res, Err(PdpError::Bind { .. })));
}

#[tokio::test]
async fn startup_failures_before_any_port_opens() {
    let dir = policy_root();

    let missing = config::load_from_str(&cfg_yaml(
        dir.path(),
        &path_str(dir.path(), "nope.yaml"),
        "127.0.0.1:0",
        "127.0.0.1:1",
    ))
    .unwrap();
    let err = run(missing, std::future::pending::<()>()).await.unwrap_err();
    assert_eq!(err.client_code().as_str(), "INVALID_POLICY");

    let empty = config::load_from_str(&cfg_yaml(dir.path(), "", "127.0.0.1:0", "127.0.0.1:1")).unwrap();
    let err = run(empty, std::future::pending::<()>()).await.unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");

    let no_root = config::load_from_str(&cfg_yaml(
        &dir.path().join("missing-dir"),
        "a.yaml",
        "127.0.0.1:0",
        "127.0.0.1:1",
    ))
    .unwrap();
    assert!(run(no_root, std::future::pending::<()>()).await.is_err());
}

#[tokio::test]
async fn run_serves_until_shutdown_signal() {
    let dir = policy_root();
    let cfg = config::load_from_str(&format!(
        "{}tracing:\n  backend: \"log\"\n",
        cfg_yaml(
            dir.path(),
            &path_str(dir.path(), "a.yaml"),
            "127.0.0.1:0",
            "127.0.0.1:0",
        )
    ))
    .unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(run(cfg, async move {
        let _ = rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());

    tx.send(()).unwrap();
    let res = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(res.is_ok());
}
