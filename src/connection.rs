//! Consumer-side tunnel sessions.
//!
//! A [`ConnectionManager`] asks the [`ConnectionRegistry`] for a connection
//! built by the factory registered for the proposal's service type. For the
//! native engine that is [`MobileConnectionFactory`], which wires an
//! [`EventAdapter`] between the engine and the manager and hands the session
//! handle to the [`SessionTracker`]. Everything observable is republished on
//! the [`EventBus`].

pub mod connection_manager;
pub mod credentials;
pub mod engine;
pub mod event_adapter;
pub mod event_bus;
pub mod factory;
pub mod profile;
pub mod registry;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connection_manager::ConnectionManager;
pub use event_adapter::EventAdapter;
pub use event_bus::{EventBus, EventSubscriber};
pub use factory::{EngineSettings, MobileConnectionFactory};
pub use registry::{Connection, ConnectionFactory, ConnectionRegistry};
pub use tracker::{ReconnectableSession, SessionTracker};
