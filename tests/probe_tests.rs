//! Probe cascade tests against a local, method-sensitive HTTP stub.
//!
//! The stub speaks just enough HTTP/1.1 for reqwest: it reads the request
//! head, inspects the method, and answers (or drops the connection)
//! according to the configured behavior. TLS attempts are recognized by
//! their ClientHello first byte and dropped immediately, so the cascade's
//! https-then-http ordering falls through to plaintext quickly.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use subsweep::config::EnumerationConfig;
use subsweep::probe::{HttpProber, ProbeMethod, ProbeSignal, Prober};

#[derive(Clone, Copy)]
enum StubBehavior {
    /// Drop HEAD/OPTIONS connections; answer GET with 200 and a title page
    GetOnly,
    /// Answer every method with 200; GET carries a title page
    AllMethods,
    /// Accept connections but never respond
    Silent,
}

const TITLE_PAGE: &str = "<html><head><title>Login</title></head><body>ok</body></html>";

async fn spawn_stub(behavior: StubBehavior) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle_connection(socket, behavior));
        }
    });

    addr
}

async fn handle_connection(mut socket: TcpStream, behavior: StubBehavior) {
    let mut buf = vec![0u8; 4096];
    let mut total = 0;

    loop {
        let Ok(n) = socket.read(&mut buf[total..]).await else {
            return;
        };
        if n == 0 {
            return;
        }
        total += n;
        // TLS ClientHello: not an HTTP request; drop so https attempts
        // fail fast instead of stalling.
        if buf[0] == 0x16 {
            return;
        }
        if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if total == buf.len() {
            break;
        }
    }

    let request = String::from_utf8_lossy(&buf[..total]);
    let method = request.split_whitespace().next().unwrap_or("").to_string();

    match behavior {
        StubBehavior::Silent => {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        StubBehavior::GetOnly => {
            if method == "GET" {
                let _ = socket.write_all(ok_with_body().as_bytes()).await;
            }
            // Other methods: drop the connection without a response.
        }
        StubBehavior::AllMethods => {
            if method == "GET" {
                let _ = socket.write_all(ok_with_body().as_bytes()).await;
            } else {
                let head = "HTTP/1.1 200 OK\r\nServer: stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;
            }
        }
    }
}

fn ok_with_body() -> String {
    format!(
        "HTTP/1.1 200 OK\r\nServer: stub\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        TITLE_PAGE.len(),
        TITLE_PAGE
    )
}

fn probe_config(get_fallback: bool) -> EnumerationConfig {
    EnumerationConfig {
        dns_precheck: false,
        get_fallback,
        attempt_timeout: Duration::from_millis(400),
        get_timeout: Duration::from_millis(600),
        ..EnumerationConfig::default()
    }
}

#[tokio::test]
async fn test_get_fallback_rescues_method_hostile_target() {
    let addr = spawn_stub(StubBehavior::GetOnly).await;
    let prober = HttpProber::new(&probe_config(true), None).unwrap();

    let outcome = prober.probe(&addr.to_string()).await;
    assert_eq!(outcome.signal, ProbeSignal::Status(200));
    assert_eq!(outcome.method, Some(ProbeMethod::Get));
    assert!(outcome.is_informative());
    assert_eq!(outcome.metadata.title.as_deref(), Some("Login"));
    assert_eq!(outcome.metadata.scheme.as_deref(), Some("http"));
    assert_eq!(outcome.metadata.detected_by.as_deref(), Some("GET(limited)"));
}

#[tokio::test]
async fn test_fallback_disabled_yields_no_signal() {
    let addr = spawn_stub(StubBehavior::GetOnly).await;
    let prober = HttpProber::new(&probe_config(false), None).unwrap();

    let outcome = prober.probe(&addr.to_string()).await;
    assert!(!outcome.is_informative());
    assert_eq!(outcome.signal, ProbeSignal::ConnectionError);
    assert!(outcome.metadata.title.is_none());
    assert!(outcome.metadata.status_code.is_none());
}

#[tokio::test]
async fn test_head_short_circuits_and_enrichment_harvests_title() {
    let addr = spawn_stub(StubBehavior::AllMethods).await;
    let prober = HttpProber::new(&probe_config(true), None).unwrap();

    let outcome = prober.probe(&addr.to_string()).await;
    assert_eq!(outcome.signal, ProbeSignal::Status(200));
    // Liveness was established by the header-only probe; the bounded GET
    // only enriched the metadata.
    assert_eq!(outcome.method, Some(ProbeMethod::Head));
    assert_eq!(outcome.metadata.detected_by.as_deref(), Some("HEAD"));
    assert_eq!(outcome.metadata.title.as_deref(), Some("Login"));
    assert_eq!(outcome.metadata.server.as_deref(), Some("stub"));
}

#[tokio::test]
async fn test_head_without_fallback_keeps_signal_no_title() {
    let addr = spawn_stub(StubBehavior::AllMethods).await;
    let prober = HttpProber::new(&probe_config(false), None).unwrap();

    let outcome = prober.probe(&addr.to_string()).await;
    assert_eq!(outcome.signal, ProbeSignal::Status(200));
    assert_eq!(outcome.method, Some(ProbeMethod::Head));
    assert!(outcome.metadata.title.is_none());
}

#[tokio::test]
async fn test_silent_target_times_out() {
    let addr = spawn_stub(StubBehavior::Silent).await;
    let prober = HttpProber::new(&probe_config(false), None).unwrap();

    let outcome = prober.probe(&addr.to_string()).await;
    assert_eq!(outcome.signal, ProbeSignal::Timeout);
    assert!(!outcome.is_informative());
}

#[tokio::test]
async fn test_refused_connection_classified() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let prober = HttpProber::new(&probe_config(true), None).unwrap();
    let outcome = prober.probe(&addr.to_string()).await;
    assert_eq!(outcome.signal, ProbeSignal::ConnectionError);
    assert!(!outcome.is_informative());
    assert!(outcome.metadata.error.is_some());
}

#[tokio::test]
async fn test_elapsed_time_recorded() {
    let addr = spawn_stub(StubBehavior::AllMethods).await;
    let prober = HttpProber::new(&probe_config(false), None).unwrap();

    let outcome = prober.probe(&addr.to_string()).await;
    assert!(outcome.elapsed > Duration::ZERO);
    assert_eq!(outcome.host, addr.to_string());
}
