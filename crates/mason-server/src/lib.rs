//! The long-lived resolution worker process.
//!
//! [`ResolutionService`] owns the scheduler, the index registry, the
//! resolution facade and the per-session settings; [`serve`] speaks the
//! framed wire protocol over any async byte stream and keeps every call
//! cancellable through the in-flight request table.

mod server;
mod service;

pub use server::{serve, ServeError};
pub use service::{ResolutionService, ServiceConfig, UnconfiguredTransport};
