use async_trait::async_trait;
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::engine::NativeSession;
use super::event_bus::EventSubscriber;
use super::types::{BusEvent, ConnectionState};
use crate::error_handling::types::ConnectionError;

/// A session that can be asked to reconnect in place.
pub trait ReconnectableSession: Send + Sync {
    fn reconnect(&self, after_seconds: u32) -> Result<(), ConnectionError>;
}

/// Owner of the single active native session handle.
///
/// The handle is replaced on every new connection attempt and dropped as soon
/// as a `Disconnecting` event is observed, so a reconnect can never reach a
/// session that is being torn down. Every access goes through one lock.
#[derive(Default)]
pub struct SessionTracker {
    session: Mutex<Option<Arc<dyn NativeSession>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn NativeSession>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_created(&self, session: Arc<dyn NativeSession>) {
        let replaced = self.slot().replace(session).is_some();
        debug!("Session handle registered (replaced previous: {})", replaced);
    }

    pub fn clear(&self) {
        if self.slot().take().is_some() {
            info!("Session handle released");
        }
    }

    pub fn has_session(&self) -> bool {
        self.slot().is_some()
    }

    pub fn handle_state(&self, state: ConnectionState) {
        if state == ConnectionState::Disconnecting {
            self.clear();
        }
    }
}

impl ReconnectableSession for SessionTracker {
    fn reconnect(&self, after_seconds: u32) -> Result<(), ConnectionError> {
        let slot = self.slot();
        let session = slot.as_ref().ok_or(ConnectionError::NoActiveSession)?;
        info!("Reconnecting active session in {}s", after_seconds);
        session.reconnect(after_seconds)?;
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for SessionTracker {
    async fn handle(&self, event: &BusEvent) {
        if let BusEvent::State(e) = event {
            self.handle_state(e.state);
        }
    }
}
