pub mod loop_worker;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use loop_worker::{run_tick, RecheckDeps, TickReport};

use loop_worker::recheck_loop;

/// Owns the single recheck timer task.
pub struct RecheckLoop {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl RecheckLoop {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, deps: RecheckDeps, period: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("recheck loop already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(recheck_loop(deps, period, cancel_token.clone()));

        info!("Recheck loop started ({}s period)", period.as_secs());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("recheck loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for RecheckLoop {
    fn default() -> Self {
        Self::new()
    }
}
