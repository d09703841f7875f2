//! Core traits for the dipper reconciler
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressResolver`]: Discover own and published addresses
//! - [`ProviderClient`]: Push an address to a provider's update API

pub mod address_resolver;
pub mod provider_client;

pub use address_resolver::{AddressFamily, AddressResolver, AddressSnapshot, Resolution};
pub use provider_client::{ProviderClient, PushAck};
