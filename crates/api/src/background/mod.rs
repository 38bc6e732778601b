//! Background tasks.
//!
//! Each submodule provides long-running async work intended to be spawned
//! on the runtime. All tasks observe a [`CancellationToken`] for graceful
//! shutdown.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod visualization_polling;

pub use visualization_polling::BackgroundPolling;
