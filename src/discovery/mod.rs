//! Capability discovery against the tools endpoint.
//!
//! [`client`] speaks the paginated wire protocol, [`coordinator`] keeps a
//! catalog snapshot fresh as the session token and tenant selection change,
//! and [`epoch`] supplies the counter that suppresses stale responses.

pub mod client;
pub mod coordinator;
pub mod epoch;
pub mod transport;
pub mod wire;

pub use client::{ConnectionHandle, DiscoveryClient};
pub use coordinator::{CatalogSource, DiscoveryCoordinator, DiscoverySnapshot};
pub use epoch::{Epoch, EpochCounter};
pub use wire::{ToolAnnotations, ToolDescriptor, ToolInputSchema, ToolPage};
