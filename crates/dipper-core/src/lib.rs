// # dipper-core
//
// Core library for the dipper dynamic DNS reconciler.
//
// ## Architecture Overview
//
// This library keeps a set of hostnames pointed at the machine's current
// public addresses, across providers with different update protocols:
// - **AddressResolver**: Trait for discovering own and published addresses
// - **ProviderClient**: Trait for pushing an address to one provider's API
// - **ReconciliationEngine**: Decides whether a push is needed and performs it
// - **Scheduler**: Runs the notify and check cycles as two background workers
// - **AccountRegistry / ProviderRegistry**: Domain → account, type → client
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from providers and resolvers
// 2. **Families are independent**: IPv4 and IPv6 are reconciled separately
// 3. **Plugin-Based**: Providers are registered by name, no hard-coded if-else
// 4. **Failure isolation**: One account's failure never stops the others
// 5. **No persisted state**: Every tick works from fresh lookups

pub mod account;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod timer;
pub mod traits;

// Re-export core types for convenience
pub use account::{Account, Credentials};
pub use config::{AccountConfig, DipperConfig, ProviderConfig, ScheduleConfig};
pub use engine::{OutcomeReason, ReconciliationEngine, ReconciliationOutcome};
pub use error::{Error, Result};
pub use registry::{AccountRegistry, ProviderRegistry};
pub use scheduler::{CycleKind, Scheduler, SchedulerEvent, SchedulerHandle};
pub use timer::{TickStream, Timer, TokioTimer};
pub use traits::{AddressFamily, AddressResolver, AddressSnapshot, ProviderClient, PushAck, Resolution};
