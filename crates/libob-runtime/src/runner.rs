//! Starting, running and stopping a [`OneBot`].
//!
//! Startup runs the startup hooks, then starts every connection. Shutdown
//! cancels the connections, runs the shutdown hooks and finally cancels
//! every task still tracked by the implementation's [`TaskManager`](libob_core::TaskManager).

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use libob_core::ActionSink;
use libob_transport::ConnectionContext;
use tokio::signal;
use tracing::{error, info, warn};

use crate::error::RuntimeResult;
use crate::onebot::OneBot;

impl OneBot {
    /// Runs startup hooks and starts every connection.
    ///
    /// A failing startup hook aborts before any connection starts. A failing
    /// connection stops the implementation, shutdown hooks included.
    pub async fn start(self: &Arc<Self>) -> RuntimeResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("OneBot is already running");
            return Ok(());
        }

        info!(
            impl_name = %self.impl_info().name,
            connections = self.connections.len(),
            "Starting OneBot implementation"
        );
        self.lifespan.startup().await?;

        let sink: Arc<dyn ActionSink> = self.router.clone();
        for connection in &self.connections {
            let ctx = ConnectionContext::new(
                sink.clone(),
                self.tasks.clone(),
                self.shutdown.child_token(),
            );
            if let Err(err) = connection.start(ctx).await {
                error!(kind = %connection.kind(), error = %err, "Failed to start connection");
                if let Err(stop_err) = self.stop().await {
                    error!(error = %stop_err, "Shutdown after failed start also failed");
                }
                return Err(err.into());
            }
            info!(kind = %connection.kind(), "Connection started");
        }

        info!("OneBot implementation started");
        Ok(())
    }

    /// Stops the connections, runs shutdown hooks and cancels all tasks.
    ///
    /// Tasks are cancelled even when a shutdown hook fails; the hook's error
    /// is returned afterwards.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            warn!("OneBot is already stopped");
            return Ok(());
        }

        info!("Stopping OneBot implementation");
        self.shutdown.cancel();
        let hooks = self.lifespan.shutdown().await;
        self.tasks.cancel_all();
        info!(remaining_tasks = self.tasks.len(), "OneBot implementation stopped");

        hooks.map_err(Into::into)
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self: &Arc<Self>) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(self: &Arc<Self>, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        info!("OneBot implementation is running. Press Ctrl+C to stop.");
        shutdown.await;
        self.stop().await
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(err) => warn!(error = %err, "Cannot listen for SIGTERM"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => error!(error = %err, "Cannot listen for Ctrl+C, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use libob_core::{ActionRequest, Bot, ImplInfo, Map, Value};
    use libob_transport::ConnectionKind;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::RuntimeError;
    use crate::onebot::OneBotBuilder;
    use crate::onebot::testing::Recorder;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn builder(recorder: &Arc<Recorder>, log: &Log) -> OneBotBuilder {
        let (up, down) = (log.clone(), log.clone());
        OneBot::builder(ImplInfo::new("walle", "0.2.0", "qq"))
            .bot(Bot::new("qq", "1"))
            .shared_connection(recorder.clone())
            .on_startup(move || {
                let log = up.clone();
                async move {
                    log.lock().push("startup");
                    Ok(())
                }
            })
            .on_shutdown(move || {
                let log = down.clone();
                async move {
                    log.lock().push("shutdown");
                    Ok(())
                }
            })
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn run_until_starts_serves_and_stops() {
        let log = Log::default();
        let recorder = Recorder::new(ConnectionKind::WebSocket);
        let onebot = builder(&recorder, &log).build().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let running = tokio::spawn({
            let onebot = onebot.clone();
            async move {
                onebot
                    .run_until(async {
                        let _ = stop_rx.await;
                    })
                    .await
            }
        });

        eventually(|| recorder.context().is_some()).await;
        assert_eq!(*log.lock(), vec!["startup"]);
        let ctx = recorder.context().unwrap();
        assert!(!ctx.shutdown.is_cancelled());

        // the connection's sink is wired to the registry
        let response = ctx
            .sink
            .handle_request(ActionRequest::new("get_version", Map::new()))
            .await;
        assert_eq!(response.data.get("impl"), Some(&Value::from("walle")));

        let tasks = onebot.tasks().clone();
        let pending = tokio::spawn(async move {
            tasks
                .spawn(std::future::pending::<&'static str>(), "cancelled")
                .await
        });
        eventually(|| onebot.tasks().len() == 1).await;

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();

        assert!(ctx.shutdown.is_cancelled());
        assert_eq!(*log.lock(), vec!["startup", "shutdown"]);
        assert_eq!(pending.await.unwrap(), "cancelled");
    }

    #[tokio::test]
    async fn failed_startup_hook_starts_nothing() {
        let log = Log::default();
        let recorder = Recorder::new(ConnectionKind::Http);
        let onebot = builder(&recorder, &log)
            .on_startup(|| async { Err(anyhow::anyhow!("database offline")) })
            .build()
            .unwrap();

        let err = onebot.run_until(async {}).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Lifespan(_)));
        assert!(recorder.context().is_none());
        assert_eq!(*log.lock(), vec!["startup"]);
    }

    #[tokio::test]
    async fn failed_connection_stops_everything() {
        let log = Log::default();
        let good = Recorder::new(ConnectionKind::WebSocket);
        let bad = Recorder::failing(ConnectionKind::WebSocketReverse);
        let onebot = builder(&good, &log)
            .shared_connection(bad.clone())
            .build()
            .unwrap();

        let err = onebot.start().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Transport(_)));
        assert!(good.context().unwrap().shutdown.is_cancelled());
        assert_eq!(*log.lock(), vec!["startup", "shutdown"]);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let log = Log::default();
        let recorder = Recorder::new(ConnectionKind::Http);
        let onebot = builder(&recorder, &log).build().unwrap();

        onebot.start().await.unwrap();
        onebot.start().await.unwrap();
        assert_eq!(recorder.contexts.lock().len(), 1);

        onebot.stop().await.unwrap();
        onebot.stop().await.unwrap();
        assert_eq!(*log.lock(), vec!["startup", "shutdown"]);
    }
}
