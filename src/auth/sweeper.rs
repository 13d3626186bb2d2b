// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Validation Scheduler
//!
//! Background task that periodically reclaims sessions past their idle
//! deadline, so a session that is never requested again still gets removed.
//!
//! ## Strategy
//!
//! Every `interval` (default 1 hour) the scheduler runs
//! [`SessionManager::validate_sessions`], which scans for expired ids and
//! deletes them one at a time. Nothing here runs on the request path.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. [`SweeperHandle::stop`]
//! cancels the token and joins the task, so once it returns the store is
//! never touched again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::session::SessionManager;

/// Default interval between validation passes.
pub const DEFAULT_VALIDATION_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct SessionValidationScheduler {
    sessions: Arc<SessionManager>,
    interval: Duration,
}

impl SessionValidationScheduler {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            interval: DEFAULT_VALIDATION_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn onto the current runtime.
    pub fn spawn(self) -> SweeperHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(shutdown.clone()));
        SweeperHandle { shutdown, task }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Session validation scheduler starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session validation scheduler shutting down");
                    return;
                }
            }

            // Checked again so a stop racing the timer never starts a pass.
            if shutdown.is_cancelled() {
                info!("Session validation scheduler shutting down");
                return;
            }

            if let Err(e) = self.sessions.validate_sessions().await {
                warn!(error = %e, "Session validation pass failed, will retry");
            }
        }
    }
}

/// Handle to a running scheduler.
pub struct SweeperHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Token that stops the scheduler when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel and wait for the task to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Session validation scheduler ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
