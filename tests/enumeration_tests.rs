//! End-to-end orchestration tests driving the run controller with a
//! scripted prober and the in-memory gateway.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout, Instant};

use subsweep::config::EnumerationConfig;
use subsweep::controller::{RunController, RunSnapshot};
use subsweep::error::SubsweepError;
use subsweep::probe::{ProbeMetadata, ProbeMethod, ProbeOutcome, ProbeSignal, Prober};
use subsweep::store::{MemoryGateway, PersistenceGateway, RunStatus};
use subsweep::wordlist::FileWordlistProvider;

/// Prober answering from a fixed script instead of the network
struct ScriptedProber {
    outcomes: HashMap<String, (ProbeSignal, Option<String>)>,
    default: ProbeSignal,
    delay: Duration,
}

impl ScriptedProber {
    fn new(default: ProbeSignal) -> Self {
        Self {
            outcomes: HashMap::new(),
            default,
            delay: Duration::ZERO,
        }
    }

    fn with(mut self, host: &str, signal: ProbeSignal, title: Option<&str>) -> Self {
        self.outcomes
            .insert(host.to_string(), (signal, title.map(str::to_string)));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, host: &str) -> ProbeOutcome {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        let (signal, title) = self
            .outcomes
            .get(host)
            .cloned()
            .unwrap_or((self.default.clone(), None));

        let mut metadata = ProbeMetadata::default();
        if let ProbeSignal::Status(code) = signal {
            metadata.status_code = Some(code);
            metadata.scheme = Some("https".to_string());
        }
        metadata.title = title;

        ProbeOutcome {
            host: host.to_string(),
            method: Some(ProbeMethod::Head),
            signal,
            elapsed: Duration::from_millis(5),
            metadata,
        }
    }
}

fn test_config(concurrency: usize) -> EnumerationConfig {
    EnumerationConfig {
        concurrency,
        dns_precheck: false,
        batch_size: 10,
        flush_interval: Duration::from_millis(100),
        cancel_grace: Duration::from_secs(2),
        ..EnumerationConfig::default()
    }
}

fn wordlist_file(words: &[String]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    for word in words {
        writeln!(file, "{}", word).expect("write word");
    }
    file.flush().expect("flush");
    file
}

fn controller(
    gateway: Arc<MemoryGateway>,
    prober: ScriptedProber,
    config: EnumerationConfig,
) -> RunController {
    RunController::new(
        gateway,
        Arc::new(prober),
        Arc::new(FileWordlistProvider::new()),
        config,
    )
}

async fn wait_for_terminal(
    controller: &RunController,
    run_id: u64,
    limit: Duration,
) -> RunSnapshot {
    let deadline = Instant::now() + limit;
    loop {
        let snapshot = controller.status(run_id).expect("run should be registered");
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "run {} did not reach a terminal state within {:?}",
            run_id,
            limit
        );
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::ConnectionError).with(
        "api.corp.test",
        ProbeSignal::Status(200),
        Some("API"),
    );
    let words = vec!["api".to_string(), "vpn".to_string()];
    let file = wordlist_file(&words);

    let controller = controller(gateway.clone(), prober, test_config(4));
    let run_id = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await
        .unwrap();

    let snapshot = wait_for_terminal(&controller, run_id, Duration::from_secs(5)).await;
    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(snapshot.progress_processed, 2);
    assert_eq!(snapshot.progress_total, 2);
    assert_eq!(snapshot.found, 1);

    let results = controller.results(run_id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].host, "api.corp.test");
    assert_eq!(results[0].metadata["status_code"], 200);
    assert_eq!(results[0].metadata["title"], "API");

    let record = gateway.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Succeeded);
    assert_eq!(record.progress_processed, 2);
    assert!(record.finished_at.is_some());
    assert!(record.log_snippet.contains("enumeration complete"));
}

#[tokio::test]
async fn test_individual_failures_never_fail_the_run() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::Timeout)
        .with("a.corp.test", ProbeSignal::Status(200), None)
        .with("b.corp.test", ProbeSignal::Status(503), None);
    let words: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
    let file = wordlist_file(&words);

    let controller = controller(gateway, prober, test_config(2));
    let run_id = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await
        .unwrap();

    let snapshot = wait_for_terminal(&controller, run_id, Duration::from_secs(5)).await;
    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(snapshot.progress_processed, 4);

    // Only the informative status was persisted; the 503 and the timeouts
    // advanced progress without producing rows.
    let results = controller.results(run_id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].host, "a.corp.test");
}

#[tokio::test]
async fn test_proxy_error_isolation() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::ProxyError);
    let words: Vec<String> = (0..20).map(|i| format!("w{}", i)).collect();
    let file = wordlist_file(&words);

    let controller = controller(gateway, prober, test_config(8));
    let run_id = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await
        .unwrap();

    let snapshot = wait_for_terminal(&controller, run_id, Duration::from_secs(5)).await;
    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(snapshot.progress_processed, 20);
    assert_eq!(snapshot.progress_total, 20);
    assert!(controller.results(run_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_convergence() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::ConnectionError)
        .with_delay(Duration::from_millis(30));
    let words: Vec<String> = (0..300).map(|i| format!("w{}", i)).collect();
    let file = wordlist_file(&words);

    let config = test_config(4);
    let grace = config.cancel_grace;
    let controller = controller(gateway, prober, config);
    let run_id = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await
        .unwrap();

    sleep(Duration::from_millis(100)).await;
    assert!(controller.cancel(run_id), "cancel on a running run");

    let snapshot = wait_for_terminal(&controller, run_id, grace + Duration::from_secs(2)).await;
    assert_eq!(snapshot.status, RunStatus::Canceled);
    assert!(snapshot.progress_processed < snapshot.progress_total);

    // No further inserts after the terminal transition.
    let count = controller.results(run_id).await.unwrap().len();
    sleep(Duration::from_millis(300)).await;
    assert_eq!(controller.results(run_id).await.unwrap().len(), count);

    // Cancel is a no-op once the run is terminal.
    assert!(!controller.cancel(run_id));
}

#[tokio::test]
async fn test_cancel_unknown_run_is_noop() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::ConnectionError);
    let controller = controller(gateway, prober, test_config(2));
    assert!(!controller.cancel(999));
    assert!(controller.status(999).is_none());
}

#[tokio::test]
async fn test_progress_monotonic_and_bounded() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::Status(200))
        .with_delay(Duration::from_millis(5));
    let words: Vec<String> = (0..100).map(|i| format!("w{}", i)).collect();
    let file = wordlist_file(&words);

    let controller = controller(gateway, prober, test_config(8));
    let run_id = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await
        .unwrap();

    let mut last = 0;
    let snapshot = loop {
        let snapshot = controller.status(run_id).unwrap();
        assert!(snapshot.progress_processed >= last, "progress went backwards");
        assert!(snapshot.progress_processed <= snapshot.progress_total);
        last = snapshot.progress_processed;
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        sleep(Duration::from_millis(10)).await;
    };

    assert_eq!(snapshot.status, RunStatus::Succeeded);
    assert_eq!(snapshot.progress_processed, 100);
    assert_eq!(controller.results(run_id).await.unwrap().len(), 100);
}

#[tokio::test]
async fn test_duplicate_words_counted_once() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::Status(200));
    let words: Vec<String> = ["api", "api", "vpn", "api"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let file = wordlist_file(&words);

    let controller = controller(gateway, prober, test_config(2));
    let run_id = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await
        .unwrap();

    let snapshot = wait_for_terminal(&controller, run_id, Duration::from_secs(5)).await;
    assert_eq!(snapshot.progress_total, 2);
    assert_eq!(controller.results(run_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_input_fails_before_run_exists() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::Status(200));
    let controller = controller(gateway.clone(), prober, test_config(2));

    // Empty wordlist
    let file = tempfile::NamedTempFile::new().unwrap();
    let result = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await;
    assert!(matches!(result, Err(SubsweepError::InvalidInput(_))));

    // Missing wordlist reference
    let result = controller.start("corp.test", None).await;
    assert!(matches!(result, Err(SubsweepError::InvalidInput(_))));

    // Malformed domain
    let file = wordlist_file(&["api".to_string()]);
    let result = controller
        .start("bad domain", Some(file.path().to_str().unwrap()))
        .await;
    assert!(matches!(result, Err(SubsweepError::InvalidInput(_))));

    // Nothing was created on the gateway.
    assert!(gateway.get_run(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_status_visible_while_running() {
    let gateway = Arc::new(MemoryGateway::new());
    let prober = ScriptedProber::new(ProbeSignal::Status(200))
        .with_delay(Duration::from_millis(50));
    let words: Vec<String> = (0..40).map(|i| format!("w{}", i)).collect();
    let file = wordlist_file(&words);

    let controller = controller(gateway, prober, test_config(2));
    let run_id = controller
        .start("corp.test", Some(file.path().to_str().unwrap()))
        .await
        .unwrap();

    // Status reports `running` immediately after start returns.
    let snapshot = controller.status(run_id).unwrap();
    assert_eq!(snapshot.status, RunStatus::Running);
    assert_eq!(snapshot.progress_total, 40);

    // Partial results become visible mid-run.
    let partial = timeout(Duration::from_secs(5), async {
        loop {
            let rows = controller.results(run_id).await.unwrap();
            if !rows.is_empty() {
                break rows;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("no partial results while running");
    assert!(!partial.is_empty());

    let snapshot = wait_for_terminal(&controller, run_id, Duration::from_secs(10)).await;
    assert_eq!(snapshot.status, RunStatus::Succeeded);
}
