//! Service-discovery layer over a pluggable coordination client.
//!
//! The crate has two halves:
//! - the coordination seam ([`CoordinationClient`], [`ClientFactory`]):
//!   a narrow, object-safe view of whatever coordination service backs the
//!   gateway, plus an embedded in-memory backend ([`MemoryCluster`]) that
//!   implements the same contract;
//! - the discovery layer built on that seam: [`ServiceDiscovery`]
//!   registries rooted at a namespace path, [`ServiceProvider`]s that apply
//!   a [`SelectionStrategy`] and a [`DownInstancePolicy`] on top of the raw
//!   instance set, and the immutable [`ServiceInstance`] value they trade in.
//!
//! Ownership is explicit throughout: a discovery registry borrows the client
//! it was built with, a provider borrows the registry's view, and closing
//! one never closes the other.

mod client;
mod discovery;
mod down;
mod instance;
mod memory;
mod provider;
mod strategy;

pub use client::{ClientFactory, ConnectionConfig, CoordinationClient, CoordinationError};
pub use discovery::{DiscoveryError, ServiceDiscovery};
pub use down::DownInstancePolicy;
pub use instance::{InstanceKind, ServiceInstance};
pub use memory::{MemoryClient, MemoryCluster, MemoryClusterFactory};
pub use provider::{ProviderBuilder, ServiceProvider};
pub use strategy::SelectionStrategy;
