//! Provider service management.
//!
//! This module provides the types and submodules used to start, stop and
//! inspect provider services:
//! - `control`: the control surface used by the HTTP API and the mobile bridge
//! - `registry`: the registry and runner traits
//! - `service_manager`: in-memory registry implementation
//! - `options`: per-service-type option decoders
//! - `validation`: field-level request validation errors

pub mod control;
pub mod options;
pub mod registry;
pub mod service_manager;
pub mod types;
pub mod validation;

pub use control::ServiceControl;
pub use registry::{NoopRunner, ServiceRegistry, ServiceRunner};
pub use service_manager::ServiceManager;
pub use types::{Location, Proposal, ServiceInstance, ServiceOptions, ServiceRequest, ServiceState};
