//! Capability discovery runtime for OAP servers.
//!
//! The crate keeps tenant selection and authentication state consistent and
//! race-free while a client application discovers the remotely-defined tools
//! it may call. It is organized around a small set of collaborating layers:
//! - [`core`] owns configuration loading and the constants shared across
//!   subsystems.
//! - [`auth`] wraps an identity provider behind a provider-agnostic session
//!   manager that notifies subscribers of session transitions.
//! - [`tenant`] derives the tenants a user may act as, persists the active
//!   selection across two storage tiers, and repairs stale selections.
//! - [`discovery`] opens session- and tenant-scoped connections to the
//!   discovery endpoint, pages through the advertised tool catalog, and
//!   guarantees that only the most recently initiated request's results are
//!   ever applied to visible state.

pub mod auth;
pub mod core;
pub mod discovery;
pub mod logging;
pub mod tenant;
