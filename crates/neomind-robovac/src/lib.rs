//! Robot Vacuum Integration Crate
//!
//! This crate keeps a home-automation state tree in sync with a cloud-connected
//! cleaning robot. It decides which optional capabilities the robot has, declares
//! the states those capabilities need, and translates status payloads into
//! labelled, typed state writes.
//!
//! ## Architecture
//!
//! - **Profile**: per-model value tables (fan power, mop mode, error codes, ...)
//! - **FeatureRegistry**: monotonic set of enabled capabilities with one-shot setup
//! - **RobovacSession**: bring-up sequencing, runtime detection, status dispatch
//! - **StateStore**: the state tree contract, with an in-memory implementation
//! - **DeviceTransport / MapService / ConsumableService**: collaborator contracts
//!
//! ```text
//! status payload ──> detect_and_apply_runtime_features ──> FeatureRegistry
//!                               │
//!                               v
//!                        process_status ──> dss decoder ──┐
//!                               │                         v
//!                               └──> property handlers ──> StateStore
//! ```

pub mod config;
pub mod dock_type;
pub mod docking;
pub mod error;
pub mod features;
pub mod profile;
pub mod replay;
pub mod services;
pub mod session;
pub mod status;
pub mod store;
pub mod task_group;
pub mod value;

// Re-exports for convenience
pub use config::SessionConfig;
pub use docking::{DockComponentStatus, DockingStationStatus};
pub use error::{Result, RobovacError};
pub use features::{Feature, FeatureRegistry};
pub use profile::{Profile, ValueTable};
pub use services::{ConsumableService, DeviceTimer, DeviceTransport, MapService};
pub use session::{InitPhase, RobovacSession, SessionServices};
pub use status::{StatusPayload, StatusProperty};
pub use store::{MemoryStateStore, StateDeclaration, StatePaths, StateStore};
pub use value::{StateDataType, StateValue};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
