//! A library that streams the output of a log-producing process to live subscribers.
//!
//! [`LogService`] spawns the log command (`logcat` by default), reads its
//! output line by line on a background task and hands every line to each
//! current [`Subscription`]. One-shot [`LogService::snapshot`] and
//! [`LogService::clear`] run a short-lived variant of the same command.
//!
//! # Example
//!
//! ```rust,no_run
//! use logcat_stream::{LogService, ProcessFilter, ServiceConfig};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = LogService::new(ServiceConfig::default());
//!     let mut lines = service.subscribe();
//!     service.start(Some(ProcessFilter::current())).await?;
//!
//!     while let Some(line) = lines.next().await {
//!         println!("{}", line);
//!     }
//!
//!     service.stop().await?;
//!     Ok(())
//! }
//! ```

// Internal modules - not part of public API
mod broadcast;
mod config;
mod error;
mod service;
mod source;
mod stream;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use broadcast::{Broadcaster, SubscriberId};
pub use config::{LogCommand, ProcessFilter, ServiceConfig};
pub use error::{Error, Result};
pub use service::{LogService, ServiceState, SessionEvent};
pub use source::{LiveSource, LogSource};
pub use stream::Subscription;
