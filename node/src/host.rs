//! Host process lifecycle

use crate::api::start_api_server;
use crate::runtime::HostRuntime;
use std::path::PathBuf;
use std::sync::Arc;
use stowage_core::{HostConfig, StowageResult};
use tokio::signal;
use tracing::{error, info};

/// A running STOWAGE host
pub struct StowageHost {
    runtime: Arc<HostRuntime>,
}

impl StowageHost {
    /// Create a new host
    pub fn new(config: HostConfig) -> StowageResult<Self> {
        let runtime = Arc::new(HostRuntime::new(config)?);
        Ok(Self { runtime })
    }

    /// Serve until a shutdown signal arrives
    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting STOWAGE host {}...", self.runtime.config().name);

        let api_handle = if self.runtime.config().api.enabled {
            let api_runtime = self.runtime.clone();
            let api_addr = self.runtime.config().api.listen_addr.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = start_api_server(api_runtime, &api_addr).await {
                    error!("API server error: {}", e);
                }
            }))
        } else {
            None
        };

        info!("Host started successfully");

        // Wait for shutdown signal
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping host...");
            }
            Err(e) => {
                error!("Error waiting for shutdown signal: {}", e);
            }
        }

        if let Some(handle) = api_handle {
            handle.abort();
        }

        if self.runtime.open_accounts() > 0 {
            info!(
                "Stopping with {} accounts holding open budgets",
                self.runtime.open_accounts()
            );
        }
        info!("Host stopped");

        Ok(())
    }

    /// Get runtime reference
    pub fn runtime(&self) -> &Arc<HostRuntime> {
        &self.runtime
    }
}

/// Host builder applying command line overrides to a configuration
pub struct HostBuilder {
    config: HostConfig,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
        }
    }

    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn data_dir(mut self, data_dir: PathBuf) -> Self {
        self.config.data_dir = data_dir;
        self
    }

    pub fn api_addr(mut self, addr: &str) -> Self {
        self.config.api.listen_addr = addr.to_string();
        self
    }

    pub fn build(self) -> StowageResult<StowageHost> {
        StowageHost::new(self.config)
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
