//! Graceful shutdown
//!
//! The controller stops new runs from being accepted, cancels in-flight
//! drivers through a shared token and waits (bounded) for their guards to
//! drop. Drivers still publish their terminal event and tear down remote
//! machines after cancellation, which is what the drain waits for.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;
const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Shutdown phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Accepting runs
    Running,
    /// Refusing new runs, waiting for active ones
    Draining,
    /// Done
    Terminated,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Coordinates shutdown of background run drivers
pub struct ShutdownController {
    cancel_token: CancellationToken,
    phase: AtomicU8,
    active_tasks: AtomicUsize,
    drain_timeout: Duration,
}

impl ShutdownController {
    /// Controller with the default drain timeout
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS))
    }

    /// Controller with a custom drain timeout
    #[must_use]
    pub fn with_timeout(drain_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            phase: AtomicU8::new(ShutdownPhase::Running as u8),
            active_tasks: AtomicUsize::new(0),
            drain_timeout,
        })
    }

    /// Token cancelled when shutdown starts
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            _ => ShutdownPhase::Terminated,
        }
    }

    /// Whether new runs may start
    #[must_use]
    pub fn is_accepting_work(&self) -> bool {
        self.phase() == ShutdownPhase::Running
    }

    /// Track an active task until the guard drops
    pub fn register_task(self: &Arc<Self>) -> TaskGuard {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            controller: Arc::clone(self),
        }
    }

    /// Number of active tasks
    #[must_use]
    pub fn active_task_count(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        info!(phase = %phase, "Shutdown phase changed");
    }

    /// Stop accepting work, cancel active tasks and wait for them to finish.
    ///
    /// Only the first call does anything.
    pub async fn shutdown(&self) {
        if self
            .phase
            .compare_exchange(
                ShutdownPhase::Running as u8,
                ShutdownPhase::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }
        info!(phase = %ShutdownPhase::Draining, "Shutdown phase changed");
        self.cancel_token.cancel();

        let started = tokio::time::Instant::now();
        loop {
            let active = self.active_task_count();
            if active == 0 {
                info!("All runs drained");
                break;
            }
            if started.elapsed() >= self.drain_timeout {
                warn!(
                    active_tasks = active,
                    timeout_secs = self.drain_timeout.as_secs(),
                    "Drain timeout exceeded, abandoning remaining runs"
                );
                break;
            }
            tokio::time::sleep(DRAIN_CHECK_INTERVAL).await;
        }

        self.set_phase(ShutdownPhase::Terminated);
    }
}

/// Decrements the active task count on drop
pub struct TaskGuard {
    controller: Arc<ShutdownController>,
}

impl TaskGuard {
    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.controller.cancel_token.is_cancelled()
    }

    /// Token cancelled when shutdown starts
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.controller.token()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.controller.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

/// Future for `axum::serve(..).with_graceful_shutdown`
pub async fn shutdown_signal_with_controller(controller: Arc<ShutdownController>) {
    wait_for_shutdown_signal().await;
    controller.shutdown().await;
}
