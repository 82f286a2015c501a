//! Gateway module: projects live coordination resources to remote callers.
//!
//! Remote callers never hold the coordination client, a discovery registry,
//! or a provider directly. They hold opaque string handles ("projections")
//! and invoke methods against them. This crate owns the mapping from handle
//! to live object and the lifecycle guarantees around it:
//!
//! - [`domain::registry::ResourceRegistry`]: heterogeneous, capability-erased
//!   store of `(resource, closer)` pairs with typed retrieval;
//! - [`domain::session`]: one entry per connected session, a directory of
//!   entries, and an idle reaper;
//! - [`domain::service::GatewayService`]: the discovery orchestrator;
//! - [`api::rest`]: the thin wire-translation surface.

pub mod api;
pub mod config;
pub mod domain;

pub use config::GatewayConfig;
pub use domain::error::DomainError;
pub use domain::service::GatewayService;
pub use domain::session::SessionDirectory;
