use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use task_worker::channels::{Envelope, QueueChannel};
use task_worker::config::{EmailConfig, QueueConfig, RunnerConfig};
use task_worker::notify::{EmailNotifier, LogNotifier};
use task_worker::runner::{NotificationSender, TaskRunner};
use task_worker::task::TaskResolver;
use task_worker::worker::{WorkerRequest, spawn_control_listener, spawn_submission_listener};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Stdout carries envelopes, so logs go to stderr or a file.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let log_guard = match std::env::var("TASK_WORKER_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "task-worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    };

    let runner_config = RunnerConfig::from_env().context("invalid runner configuration")?;
    let queue_config = QueueConfig::from_env().context("invalid queue configuration")?;

    if !queue_config.enabled {
        tracing::warn!("Remote tasks are disabled (TASK_WORKER_REMOTE_ENABLED=false), exiting");
        return Ok(());
    }

    eprintln!("task-worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Workers: {}..{}",
        runner_config.min_workers, runner_config.max_workers
    );
    eprintln!("   Submissions: {}", queue_config.submission_queue);
    eprintln!("   Control: {}", queue_config.control_queue);

    // ── Outbound envelopes → stdout ─────────────────────────────────────
    let (envelope_tx, mut envelope_rx) = mpsc::unbounded_channel::<Envelope>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(envelope) = envelope_rx.recv().await {
            let mut line = match serde_json::to_string(&envelope) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed to serialize envelope: {}", e);
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                tracing::error!("Failed to write envelope: {}", e);
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    // ── Runner ──────────────────────────────────────────────────────────
    let resolver = Arc::new(TaskResolver::new());
    task_worker::tasks::register_builtin(&resolver);
    eprintln!("   Task types: {}", resolver.task_types().join(", "));

    let channels = QueueChannel::new(queue_config.clone(), envelope_tx).into_task_channels();

    let notifier: Arc<dyn NotificationSender> = match EmailConfig::from_env() {
        Some(email) => {
            eprintln!("   Notifications: email via {}", email.smtp_host);
            Arc::new(EmailNotifier::new(email))
        }
        None => {
            eprintln!("   Notifications: log only");
            Arc::new(LogNotifier)
        }
    };

    let runner = Arc::new(TaskRunner::new(runner_config, resolver, channels)?.with_notifier(notifier));

    let (submit_tx, submit_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let submissions = spawn_submission_listener(Arc::clone(&runner), submit_rx);
    spawn_control_listener(Arc::clone(&runner), control_rx);

    // ── Inbound requests ← stdin ────────────────────────────────────────
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match WorkerRequest::parse(line) {
                        Ok(request) => {
                            if !request.route(&submit_tx, &control_tx) {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring malformed request: {}", e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        tracing::info!("Input closed");
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, shutting down");
        }
        _ = reader => {
            // Let work already submitted finish before stopping.
            let _ = submissions.await;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = runner.wait_idle() => {}
            }
        }
    }

    runner.shutdown();
    runner.await_termination().await;
    drop(runner);

    // Listeners may still hold channel senders; give the writer a moment to drain.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(1), writer).await;
    eprintln!("task-worker stopped");
    drop(log_guard);

    // A blocked stdin read cannot be cancelled and would stall runtime shutdown.
    std::process::exit(0)
}
