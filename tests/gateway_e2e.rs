//! End-to-end tests for the perimeter gateway.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::sync::mpsc;

use perimeter_gateway::config::GatewayConfig;
use perimeter_gateway::http::HttpServer;
use perimeter_gateway::lifecycle::Shutdown;

fn gateway_config(bind: SocketAddr, origin: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = bind.to_string();
    config.origin.url = format!("http://{origin}/");
    config
}

fn make_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    format!("{header}.{body}.")
}

async fn spawn_gateway(
    config: GatewayConfig,
) -> (Shutdown, mpsc::UnboundedSender<GatewayConfig>) {
    let bind = config.listener.bind_address.clone();
    let shutdown = Shutdown::new();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(config).expect("config should produce settings");
    let listener = tokio::net::TcpListener::bind(&bind).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    (shutdown, updates_tx)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn test_claim_and_reversed_body_reach_origin() {
    let origin_addr: SocketAddr = "127.0.0.1:29181".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29182".parse().unwrap();

    let mut captured = common::start_capture_origin(origin_addr, "done").await;
    let (shutdown, _updates) = spawn_gateway(gateway_config(gateway_addr, origin_addr)).await;

    let token = make_token(&serde_json::json!({ "name": "John Doe" }));
    let res = client()
        .post(format!("http://{gateway_addr}/"))
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "text/plain")
        .body("The cake is a lie!")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "done");

    let seen = captured.recv().await.expect("origin saw no request");
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.body, "!eil a si ekac ehT");
    assert_eq!(seen.headers.get("x-identity-id").unwrap(), "John Doe");
    assert!(seen.headers.get("authorization").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_authorization_never_reaches_origin() {
    let origin_addr: SocketAddr = "127.0.0.1:29281".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29282".parse().unwrap();

    let mut captured = common::start_capture_origin(origin_addr, "done").await;
    let (shutdown, _updates) = spawn_gateway(gateway_config(gateway_addr, origin_addr)).await;

    let res = client()
        .post(format!("http://{gateway_addr}/"))
        .body("hello")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 401);
    assert!(captured.try_recv().is_err(), "no outbound call expected");

    shutdown.trigger();
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let origin_addr: SocketAddr = "127.0.0.1:29381".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29382".parse().unwrap();

    let mut captured = common::start_capture_origin(origin_addr, "done").await;
    let (shutdown, _updates) = spawn_gateway(gateway_config(gateway_addr, origin_addr)).await;

    let res = client()
        .post(format!("http://{gateway_addr}/"))
        .header("authorization", "Bearer not.a.token.at.all")
        .body("hello")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 401);
    assert!(captured.try_recv().is_err());

    shutdown.trigger();
}

#[tokio::test]
async fn test_origin_timeout_answers_gateway_timeout() {
    let origin_addr: SocketAddr = "127.0.0.1:29481".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29482".parse().unwrap();

    common::start_slow_origin(origin_addr, Duration::from_secs(5)).await;

    let mut config = gateway_config(gateway_addr, origin_addr);
    config.timeouts.upstream_secs = 1;
    let (shutdown, _updates) = spawn_gateway(config).await;

    let token = make_token(&serde_json::json!({ "name": "jd" }));
    let res = client()
        .post(format!("http://{gateway_addr}/"))
        .header("authorization", format!("Bearer {token}"))
        .body("hello")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 504, "caller should get a timeout, not a hang");

    shutdown.trigger();
}

#[tokio::test]
async fn test_origin_status_relayed_verbatim() {
    let origin_addr: SocketAddr = "127.0.0.1:29581".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29582".parse().unwrap();

    common::start_status_origin(origin_addr, 404, "nothing here").await;
    let (shutdown, _updates) = spawn_gateway(gateway_config(gateway_addr, origin_addr)).await;

    let token = make_token(&serde_json::json!({ "name": "jd" }));
    let res = client()
        .post(format!("http://{gateway_addr}/"))
        .header("authorization", format!("Bearer {token}"))
        .body("hello")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "nothing here");

    shutdown.trigger();
}

#[tokio::test]
async fn test_config_reload_switches_origin() {
    let origin_a: SocketAddr = "127.0.0.1:29681".parse().unwrap();
    let origin_b: SocketAddr = "127.0.0.1:29682".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29683".parse().unwrap();

    let mut captured_a = common::start_capture_origin(origin_a, "a").await;
    let mut captured_b = common::start_capture_origin(origin_b, "b").await;
    let (shutdown, updates) = spawn_gateway(gateway_config(gateway_addr, origin_a)).await;

    let token = make_token(&serde_json::json!({ "name": "jd" }));
    let send = |body: &'static str| {
        let token = token.clone();
        async move {
            client()
                .post(format!("http://{gateway_addr}/"))
                .header("authorization", format!("Bearer {token}"))
                .body(body)
                .send()
                .await
                .expect("gateway unreachable")
        }
    };

    let res = send("one").await;
    assert_eq!(res.text().await.unwrap(), "a");
    assert!(captured_a.recv().await.is_some());

    updates
        .send(gateway_config(gateway_addr, origin_b))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let res = send("two").await;
    assert_eq!(res.text().await.unwrap(), "b");
    assert!(captured_b.recv().await.is_some());
    assert!(captured_a.try_recv().is_err(), "old origin should be idle");

    shutdown.trigger();
}

#[tokio::test]
async fn test_healthz_and_request_id() {
    let origin_addr: SocketAddr = "127.0.0.1:29781".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29782".parse().unwrap();

    let _captured = common::start_capture_origin(origin_addr, "done").await;
    let (shutdown, _updates) = spawn_gateway(gateway_config(gateway_addr, origin_addr)).await;

    let res = client()
        .get(format!("http://{gateway_addr}/healthz"))
        .send()
        .await
        .expect("gateway unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");

    let res = client()
        .post(format!("http://{gateway_addr}/"))
        .send()
        .await
        .expect("gateway unreachable");
    assert_eq!(res.status(), 401);
    assert!(
        res.headers().get("x-request-id").is_some(),
        "response should carry a correlation ID"
    );

    shutdown.trigger();
}
