use std::sync::Arc;

use crate::config::Config;
use crate::core::launcher::Launcher;
use crate::core::supervisor::Supervisor;
use crate::error::SupervisorError;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    launcher: Arc<dyn Launcher>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration and process launcher.
    pub fn new(cfg: Config, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            cfg,
            launcher,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (spawns, exits, restarts, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and builds the supervisor.
    ///
    /// Must be called from within a tokio runtime (subscriber workers are
    /// spawned here).
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        self.cfg.validate()?;
        let subs = SubscriberSet::new(self.subscribers);
        Ok(Supervisor::new(self.cfg, self.launcher, subs))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::core::launcher::{Notifier, WorkerHandle};
    use crate::core::registry::WorkerId;

    struct NoLauncher;

    impl Launcher for NoLauncher {
        fn launch(&self, _: WorkerId, _: Notifier) -> io::Result<Box<dyn WorkerHandle>> {
            Err(io::Error::other("not used"))
        }
    }

    #[tokio::test]
    async fn rejects_empty_fleet() {
        let cfg = Config {
            workers: 0,
            ..Config::default()
        };
        let built = SupervisorBuilder::new(cfg, Arc::new(NoLauncher)).build();
        assert!(matches!(built, Err(SupervisorError::Config(_))));
    }

    #[tokio::test]
    async fn builds_with_defaults() {
        assert!(
            SupervisorBuilder::new(Config::default(), Arc::new(NoLauncher))
                .build()
                .is_ok()
        );
    }
}
