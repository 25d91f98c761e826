//! Ordered startup and shutdown hooks.

use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::error::LifespanError;

type Hook = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Startup and shutdown hook lists, run strictly in registration order.
///
/// The first failing hook stops its phase; later hooks of that phase do not
/// run and the error is returned to the caller.
#[derive(Default)]
pub struct LifespanManager {
    startup: Vec<Hook>,
    shutdown: Vec<Hook>,
}

impl LifespanManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_startup<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.startup.push(Box::new(move || Box::pin(hook())));
    }

    pub fn on_shutdown<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.shutdown.push(Box::new(move || Box::pin(hook())));
    }

    pub async fn startup(&self) -> Result<(), LifespanError> {
        run_hooks("startup", &self.startup).await
    }

    pub async fn shutdown(&self) -> Result<(), LifespanError> {
        run_hooks("shutdown", &self.shutdown).await
    }
}

async fn run_hooks(phase: &'static str, hooks: &[Hook]) -> Result<(), LifespanError> {
    debug!(phase, count = hooks.len(), "Running lifespan hooks");
    for (index, hook) in hooks.iter().enumerate() {
        if let Err(source) = hook().await {
            error!(phase, index, error = %source, "Lifespan hook failed");
            return Err(LifespanError {
                phase,
                index,
                source,
            });
        }
    }
    Ok(())
}

impl std::fmt::Debug for LifespanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifespanManager")
            .field("startup", &self.startup.len())
            .field("shutdown", &self.shutdown.len())
            .finish()
    }
}
