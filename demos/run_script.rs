//! Runs one script under the execution pool and prints its events.
//!
//! ```text
//! cargo run --example run_script -- path/to/script.sh [--abort-after-ms 500] [--interpreter /bin/sh]
//! RUST_LOG=jobvisor=debug cargo run --example run_script -- ./job.sh
//! ```

use std::{env, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use async_trait::async_trait;
use jobvisor::{Config, Event, EventKind, ExecutionPool, Interpreter, Subscribe};
use tracing_subscriber::EnvFilter;

/// Prints every event to stdout.
struct Printer;

#[async_trait]
impl Subscribe for Printer {
    async fn on_event(&self, e: &Event) {
        let msg = e.message.as_deref().unwrap_or("");
        match e.kind {
            EventKind::JobStarted => {
                println!("[{}] started {}", e.job, e.script.as_deref().unwrap_or("?"));
            }
            EventKind::JobProgress => {
                let pct = e.progress.map_or(-1, |p| p.as_raw());
                println!("[{}] {pct:>4}% {msg}", e.job);
            }
            EventKind::JobFinished => println!("[{}] finished", e.job),
            EventKind::AbortRequested => println!("[{}] abort requested", e.job),
            EventKind::JobAborted => println!("[{}] aborted", e.job),
            EventKind::JobError => println!("[{}] error: {msg}", e.job),
        }
    }

    fn name(&self) -> &'static str {
        "Printer"
    }
}

struct Args {
    script: String,
    abort_after: Option<Duration>,
    interpreter: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut it = env::args().skip(1);
    let mut script = None;
    let mut abort_after = None;
    let mut interpreter = None;
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--abort-after-ms" => {
                let ms: u64 = it
                    .next()
                    .context("--abort-after-ms needs a value")?
                    .parse()
                    .context("--abort-after-ms expects milliseconds")?;
                abort_after = Some(Duration::from_millis(ms));
            }
            "--interpreter" => {
                interpreter = Some(it.next().context("--interpreter needs a value")?);
            }
            _ if script.is_none() => script = Some(arg),
            other => bail!("unexpected argument {other:?}"),
        }
    }
    Ok(Args {
        script: script.context("usage: run_script <script> [--abort-after-ms N] [--interpreter P]")?,
        abort_after,
        interpreter,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let cfg = Config {
        interpreter: args.interpreter.map(Interpreter::new),
        ..Config::default()
    };

    let pool = ExecutionPool::builder(cfg)
        .with_subscriber(Arc::new(Printer))
        .build();

    let id = pool.submit(&args.script)?;
    if let Some(delay) = args.abort_after {
        let pool = Arc::clone(&pool);
        let id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pool.request_abort(&id);
        });
    }

    pool.wait(&id).await;
    // Let the printer drain its queue.
    tokio::time::sleep(Duration::from_millis(50)).await;

    if let Some(view) = pool.board().get(&id) {
        println!("final status: {:?} ({:?}%)", view.status, view.percent);
    }
    println!("log: {}", pool.log_path(&id).display());
    pool.shutdown().await?;
    Ok(())
}
