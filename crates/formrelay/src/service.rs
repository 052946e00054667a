//! Running the front-end and collector as tasks.
//!
//! Both components are bound before either starts, so a port conflict is
//! reported immediately. After that each task runs on its own: a fatal error
//! in one is logged and does not stop the other, and both stop when the
//! shared [`Shutdown`] is triggered.

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::collector::Collector;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frontend::FrontEnd;
use crate::shutdown::Shutdown;

/// Which components a process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Components {
    /// Front-end and collector together.
    Both,
    /// Only the HTTP front-end.
    FrontEnd,
    /// Only the datagram collector.
    Collector,
}

impl Components {
    fn includes_frontend(self) -> bool {
        matches!(self, Self::Both | Self::FrontEnd)
    }

    fn includes_collector(self) -> bool {
        matches!(self, Self::Both | Self::Collector)
    }
}

async fn join(name: &'static str, handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.await {
        Ok(Ok(())) => {
            info!("{name} stopped");
            Ok(())
        }
        Ok(Err(err)) => {
            error!("{name} failed: {err}");
            Err(err)
        }
        Err(err) => {
            error!("{name} task panicked: {err}");
            Err(Error::internal(format!("{name} task failed: {err}")))
        }
    }
}

/// Bind the selected components and run them until `shutdown` is triggered.
///
/// # Errors
///
/// Returns an error if a component cannot be bound, or the first error a
/// component stopped with.
pub async fn run(config: &Config, components: Components, shutdown: Shutdown) -> Result<()> {
    let collector = if components.includes_collector() {
        Some(Collector::from_config(config).await?)
    } else {
        None
    };
    let frontend = if components.includes_frontend() {
        Some(FrontEnd::from_config(config).await?)
    } else {
        None
    };

    let collector = collector.map(|c| tokio::spawn(c.run(shutdown.clone())));
    let frontend = frontend.map(|f| tokio::spawn(f.run(shutdown.clone())));

    let mut first_error = None;
    if let Some(handle) = frontend {
        if let Err(err) = join("HTTP server", handle).await {
            first_error.get_or_insert(err);
        }
    }
    if let Some(handle) = collector {
        if let Err(err) = join("Collector", handle).await {
            first_error.get_or_insert(err);
        }
    }

    first_error.map_or(Ok(()), Err)
}
