//! # subsweep - HTTP Subdomain Enumeration Engine
//!
//! subsweep is a security reconnaissance tool written in Rust: given a root
//! domain, it synthesizes subdomain candidates from a wordlist, probes each
//! candidate's liveness over HTTP under bounded concurrency, and persists a
//! deduplicated set of discovered hosts with lightweight metadata.
//!
//! ## Features
//!
//! - **Bounded-Concurrency Probing**: a fixed worker pool drives hundreds of
//!   candidates through a minimal-footprint HEAD → OPTIONS → GET cascade
//! - **Live Progress**: polling callers get status, progress counters, and a
//!   bounded log tail while a run executes
//! - **Cooperative Cancellation**: runs stop between candidates with a
//!   bounded grace period for in-flight probes
//! - **Partial-Failure Tolerance**: timeouts, refused connections, and proxy
//!   faults are recorded per candidate and never abort a run
//! - **Deduplicated Persistence**: (run, host) uniqueness enforced in memory
//!   and at the storage layer, with batched writes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subsweep::config::EnumerationConfig;
//! use subsweep::controller::RunController;
//! use subsweep::probe::HttpProber;
//! use subsweep::store::MemoryGateway;
//! use subsweep::wordlist::FileWordlistProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EnumerationConfig::default();
//!     let controller = RunController::new(
//!         Arc::new(MemoryGateway::new()),
//!         Arc::new(HttpProber::new(&config, None)?),
//!         Arc::new(FileWordlistProvider::new()),
//!         config,
//!     );
//!
//!     let run_id = controller.start("example.com", Some("words.txt")).await?;
//!     while let Some(snapshot) = controller.status(run_id) {
//!         if snapshot.status.is_terminal() {
//!             println!("{}: {}/{} processed", snapshot.status,
//!                 snapshot.progress_processed, snapshot.progress_total);
//!             break;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(200)).await;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`controller`]: run lifecycle, worker pool, and the run registry
//! - [`probe`]: the per-candidate HTTP probe cascade
//! - [`aggregate`]: outcome deduplication and batched persistence
//! - [`candidates`]: wordlist-to-candidate generation
//! - [`store`]: persistence gateway trait plus memory and SQLite backends
//! - [`wordlist`]: wordlist loading
//! - [`proxy`]: proxy descriptors routing probe traffic
//! - [`cancel`]: cooperative cancellation token
//! - [`logbuf`]: per-run log ring buffer
//! - [`config`]: CLI/environment configuration
//! - [`rate_limit`]: optional probe throttling
//! - [`logging`]: process-level structured logging
//! - [`error`]: error taxonomy
//! - [`validation`]: input validation
//! - [`constants`]: tuning defaults

pub mod aggregate;
pub mod cancel;
pub mod candidates;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod logbuf;
pub mod logging;
pub mod probe;
pub mod proxy;
pub mod rate_limit;
pub mod store;
pub mod utils;
pub mod validation;
pub mod wordlist;
