//! Cancellation signal shared by the long-running components.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// A cloneable handle used to stop the front-end and the collector.
///
/// All clones share the same signal; triggering any of them wakes every
/// task waiting on [`Shutdown::wait`].
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every holder to stop.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Check if the signal has been sent.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal is sent. Returns immediately if it already was.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Trigger the signal on Ctrl+C or SIGTERM.
    ///
    /// Runs until one of the OS signals arrives or the signal is triggered
    /// some other way.
    pub async fn trigger_on_os_signal(&self) {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down");
            } else {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("Received terminate signal, shutting down");
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => self.trigger(),
            () = terminate => self.trigger(),
            () = self.wait() => {}
        }
    }
}
