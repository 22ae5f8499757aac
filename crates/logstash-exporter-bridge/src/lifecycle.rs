//! Process lifecycle: spawns the ingestion loop, the staging sampler and the
//! HTTP server, and stops all three on SIGINT/SIGTERM.
//!
//! Shutdown is a `watch` flag. Every activity races its suspension point
//! (blocking pop, tick, backoff sleep, accept) against it, so a stop request is
//! honoured even while the loop is parked on an empty queue.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use logstash_exporter_core::error::{ExporterError, Result};

use crate::app_state::AppState;
use crate::config::ExporterConfig;
use crate::ingest::IngestionLoop;
use crate::queue::{QueueConnector, RedisConnector};
use crate::retry::RetryPolicy;
use crate::router;
use crate::sampler::StagingSampler;

/// Resolves once shutdown is requested or the lifecycle owner is gone.
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub struct Lifecycle {
    state: AppState,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Lifecycle {
    pub fn new(state: AppState) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            state,
            shutdown,
            tasks: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(fut)));
    }

    /// Spawn the ingestion loop and the staging sampler.
    pub fn start_queue_tasks(&mut self, connector: Arc<dyn QueueConnector>) {
        let cfg = self.state.cfg();
        let ingest = IngestionLoop::new(
            Arc::clone(&connector),
            self.state.metrics(),
            cfg.redis.stats_queue.clone(),
            RetryPolicy::from_config(&cfg.retry),
            self.subscribe(),
        );
        let sampler = StagingSampler::new(
            connector,
            self.state.metrics(),
            cfg.redis.staging_queue.clone(),
            cfg.sampler.interval(),
        );
        let sampler_shutdown = self.subscribe();

        self.spawn("ingest", ingest.run());
        self.spawn("sampler", sampler.run(sampler_shutdown));
    }

    /// Flip readiness to draining and signal every activity.
    pub fn shutdown(&self) {
        self.state.set_draining();
        self.shutdown.send_replace(true);
    }

    /// Wait for every spawned activity to finish.
    pub async fn join(self) {
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                tracing::error!(task = name, error = %e, "task ended abnormally");
            }
        }
    }
}

/// Serve the exposition endpoint until shutdown.
pub async fn serve_http(listener: TcpListener, state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let app = router::build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_requested(&mut shutdown).await })
        .await
        .map_err(|e| ExporterError::Internal(format!("http server failed: {e}")))
}

/// Run the exporter until a termination signal. Only startup problems and an
/// unexpected HTTP server exit are errors; queue trouble is retried forever.
pub async fn run(cfg: ExporterConfig) -> Result<()> {
    let listen = cfg.http.listen_addr()?;
    let connector: Arc<dyn QueueConnector> = Arc::new(RedisConnector::from_config(&cfg.redis, &cfg.retry));
    let state = AppState::new(cfg)?;

    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| ExporterError::Config(format!("failed to bind http listener on {listen}: {e}")))?;
    tracing::info!(%listen, "starting http server");

    let mut lifecycle = Lifecycle::new(state.clone());
    lifecycle.start_queue_tasks(connector);

    let mut server = tokio::spawn(serve_http(listener, state, lifecycle.subscribe()));

    let early_exit = tokio::select! {
        _ = termination_signal() => {
            tracing::info!("shutdown signal received");
            None
        }
        res = &mut server => Some(res),
    };

    lifecycle.shutdown();
    let unexpected = early_exit.is_some();
    let server_result = match early_exit {
        Some(res) => res,
        None => server.await,
    };
    lifecycle.join().await;

    let served = server_result.map_err(|e| ExporterError::Internal(format!("http server task: {e}")))?;
    served?;
    if unexpected {
        return Err(ExporterError::Internal("http server stopped unexpectedly".into()));
    }
    tracing::info!("logstash-exporter stopped");
    Ok(())
}

async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let term = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = term => {}
    }
}
