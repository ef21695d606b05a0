// subsweep - HTTP subdomain enumeration engine

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use colored::*;

use subsweep::config::Config;
use subsweep::constants;
use subsweep::controller::{RunController, RunSnapshot};
use subsweep::error::{Result, SubsweepError};
use subsweep::logging;
use subsweep::probe::HttpProber;
use subsweep::proxy::ProxyDescriptor;
use subsweep::store::sqlite::SqliteGateway;
use subsweep::store::{MemoryGateway, PersistenceGateway, RunStatus, SubdomainRow};
use subsweep::utils;
use subsweep::wordlist::FileWordlistProvider;

/// Application entry point
#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        process::exit(0);
    }

    let config = match Config::from_args(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{} {}", "ERROR".red().bold(), e);
            process::exit(1);
        }
    };

    let _guards = match logging::init_logging(&config.logging) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("{} {}", "ERROR".red().bold(), e);
            process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("{} {}", "ERROR".red().bold(), e);
        process::exit(1);
    }
}

/// Print usage information
fn print_usage() {
    eprintln!(
        "{}",
        "usage: subsweep <domain> --wordlist PATH [options]".red().bold()
    );
    eprintln!("Options:");
    eprintln!("  --wordlist PATH      Wordlist file, one candidate word per line (required)");
    eprintln!("  --db PATH            Persist runs and results to a SQLite database");
    eprintln!("  --proxy URL          Route all probes through a proxy (http/https/socks5)");
    eprintln!("  --concurrency N      Probe worker pool size (default: 100)");
    eprintln!("  --timeout MS         Per-attempt probe timeout in milliseconds (default: 3000)");
    eprintln!("  --rate-limit N       Cap probes at N per second");
    eprintln!("  --no-get-fallback    Disable the size-bounded GET fallback");
    eprintln!("  --no-dns-precheck    Probe candidates without resolving them first");
    eprintln!("  --verify-ssl         Reject invalid TLS certificates");
    eprintln!("  --json               Output results as JSON");
    eprintln!("Examples:");
    eprintln!("  subsweep example.com --wordlist subdomains.txt");
    eprintln!("  subsweep corp.test --wordlist words.txt --db runs.db --concurrency 50");
    eprintln!("  subsweep corp.test --wordlist words.txt --proxy socks5://127.0.0.1:1080 --json");
}

/// Main application logic: drive one run end to end
async fn run(config: Config) -> Result<()> {
    let gateway: Arc<dyn PersistenceGateway> = match &config.db_path {
        Some(path) => Arc::new(SqliteGateway::open_file(path).await?),
        None => Arc::new(MemoryGateway::new()),
    };

    let proxy = config
        .proxy_url
        .as_deref()
        .map(ProxyDescriptor::from_url)
        .transpose()?;
    let prober = Arc::new(HttpProber::new(&config.enumeration, proxy.as_ref())?);

    let wordlist = config
        .wordlist
        .clone()
        .ok_or_else(|| SubsweepError::config("--wordlist is required"))?;

    let controller = Arc::new(RunController::new(
        gateway,
        prober,
        Arc::new(FileWordlistProvider::new()),
        config.enumeration.clone(),
    ));

    let run_id = controller.start(&config.domain, Some(&wordlist)).await?;

    if !config.json_mode {
        println!(
            "{} Enumerating {} ({} via {})",
            "SUBSWEEP".bright_yellow(),
            config.domain,
            wordlist,
            config
                .proxy_url
                .as_deref()
                .unwrap_or("direct connections")
        );
    }

    // Ctrl-C requests cooperative cancellation; the run winds down within
    // its grace period.
    {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.cancel(run_id);
            }
        });
    }

    let snapshot = poll_until_terminal(&controller, run_id, config.json_mode).await?;
    let results = controller.results(run_id).await?;

    output_results(&snapshot, &results, &config)?;

    match snapshot.status {
        RunStatus::Failed => Err(SubsweepError::pipeline(
            snapshot.error.unwrap_or_else(|| "run failed".to_string()),
        )),
        _ => Ok(()),
    }
}

/// Poll run status, rendering a progress bar until a terminal state
async fn poll_until_terminal(
    controller: &RunController,
    run_id: u64,
    json_mode: bool,
) -> Result<RunSnapshot> {
    loop {
        let snapshot = controller
            .status(run_id)
            .ok_or_else(|| SubsweepError::pipeline(format!("run {} disappeared", run_id)))?;

        if !json_mode {
            let percent = if snapshot.progress_total > 0 {
                (snapshot.progress_processed * 100 / snapshot.progress_total) as usize
            } else {
                100
            };
            let bar = utils::progress_bar(percent, constants::progress::DEFAULT_WIDTH);
            print!(
                "\r[{}] {:3}% | {}/{} probed | {} found",
                bar, percent, snapshot.progress_processed, snapshot.progress_total, snapshot.found
            );
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }

        if snapshot.status.is_terminal() {
            if !json_mode {
                println!();
            }
            return Ok(snapshot);
        }

        tokio::time::sleep(Duration::from_millis(constants::progress::POLL_INTERVAL_MS)).await;
    }
}

/// Output results in the configured format
fn output_results(snapshot: &RunSnapshot, results: &[SubdomainRow], config: &Config) -> Result<()> {
    if config.json_mode {
        let output = serde_json::json!({
            "run": snapshot,
            "results": results,
        });
        let rendered = serde_json::to_string_pretty(&output)
            .map_err(|e| SubsweepError::pipeline(format!("Failed to serialize JSON: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    let status = match snapshot.status {
        RunStatus::Succeeded => "SUCCEEDED".bright_green().bold(),
        RunStatus::Canceled => "CANCELED".yellow().bold(),
        RunStatus::Failed => "FAILED".red().bold(),
        _ => snapshot.status.as_str().normal(),
    };
    println!(
        "\n{} {} subdomains discovered for {}",
        status,
        results.len(),
        snapshot.domain
    );

    for row in results {
        let status_code = row.metadata["status_code"]
            .as_u64()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());
        let title = row.metadata["title"].as_str().unwrap_or("");
        println!(
            "  {} {} [{}] {}",
            "->".bright_blue(),
            row.host,
            status_code.bright_cyan(),
            title.bright_black()
        );
    }

    if snapshot.status == RunStatus::Failed {
        println!("\n{} Recent log:", "DETAILS".red());
        for line in &snapshot.log_tail {
            println!("  {}", line);
        }
    }

    Ok(())
}
