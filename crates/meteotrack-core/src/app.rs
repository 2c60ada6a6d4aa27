use anyhow::Result;
use std::sync::Arc;

use crate::{Config, ManagedTask};

/// Main application state and lifecycle manager
pub struct App {
    config: Arc<Config>,
    tasks: Vec<Box<dyn ManagedTask>>,
}

impl App {
    /// Create an application from an already loaded config
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            tasks: Vec::new(),
        }
    }

    /// Load and validate the configuration, then create the application
    pub fn load() -> Result<Self> {
        let (config, _) = Config::load_validated()?;
        Ok(Self::new(config))
    }

    /// Hand a started background task to the application
    pub fn register_task(&mut self, task: Box<dyn ManagedTask>) {
        tracing::info!("Registering task: {}", task.name());
        self.tasks.push(task);
    }

    /// Cancel every task, then wait for each one to exit.
    ///
    /// All tasks are signalled before any is awaited so they wind down in parallel.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down application ({} tasks)", self.tasks.len());

        for task in &self.tasks {
            tracing::debug!("Cancelling task: {}", task.name());
            task.cancel();
        }

        let mut failed = 0usize;
        for task in self.tasks.drain(..) {
            let name = task.name().to_string();
            match task.join().await {
                Ok(()) => tracing::debug!("Task stopped: {}", name),
                Err(e) => {
                    failed += 1;
                    tracing::error!("Error stopping task {}: {:#}", name, e);
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{} task(s) did not stop cleanly", failed);
        }
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the config for components that outlive a borrow
    pub fn shared_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Names of all registered tasks
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }
}
