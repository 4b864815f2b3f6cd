//! Shutdown on SIGTERM and SIGINT.

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels the gateway when the process is asked to stop.
///
/// Payment handlers run their provider calls inside [`SigDown::in_flight`]. On a
/// signal those calls are cancelled, which records them as cancelled attempts,
/// and [`SigDown::recv`] waits until every one of them has been finalized.
pub struct SigDown {
    listener: TaskTracker,
    in_flight: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Returns an error if signal registration fails.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let cancellation_token = CancellationToken::new();
        let in_flight = TaskTracker::new();

        let listener = TaskTracker::new();
        let token = cancellation_token.clone();
        let calls = in_flight.clone();
        listener.spawn(async move {
            let received = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = token.cancelled() => return,
            };
            tracing::info!(
                signal = received,
                in_flight = calls.len(),
                "shutting down, cancelling provider calls"
            );
            token.cancel();
        });
        listener.close();

        Ok(Self {
            listener,
            in_flight,
            cancellation_token,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Tracker the engine registers each payment operation with.
    pub fn in_flight(&self) -> TaskTracker {
        self.in_flight.clone()
    }

    /// Waits for the token to fire and for tracked payment operations to drain.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.in_flight.close();
        self.in_flight.wait().await;
        self.listener.wait().await;
        tracing::info!("provider calls drained");
    }
}
