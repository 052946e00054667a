//! `formrelay` - A local form front-end with a relayed submission log
//!
//! The HTTP [`frontend`] serves a small static site and forwards every posted
//! form body over UDP ([`relay`]) to the [`collector`], which decodes it
//! ([`record`]) and appends it to a JSON log on disk ([`store`]).

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod frontend;
pub mod logging;
pub mod record;
pub mod relay;
pub mod service;
pub mod shutdown;
pub mod store;

pub use collector::Collector;
pub use config::Config;
pub use error::{Error, Result};
pub use frontend::FrontEnd;
pub use logging::init_logging;
pub use record::{DecodeError, DecodedRecord};
pub use relay::{SubmissionSink, UdpRelay};
pub use shutdown::Shutdown;
pub use store::{LogEntry, LogStats, LogStore};
