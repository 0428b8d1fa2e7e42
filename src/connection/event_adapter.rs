//! Translation of engine callbacks into internal signal channels.
//!
//! The engine pushes named events and statistics samples through
//! [`EngineCallbacks`]. [`EventAdapter`] turns them into two channels a
//! generic consumer can read without knowing the engine: one of
//! [`ConnectionState`]s and one of [`SessionStatistics`].
//!
//! The adapter is the only producer of the state channel. It closes the
//! channel right after the terminal `NotConnected` and drops anything the
//! engine pushes afterwards.

use log::{debug, info, warn};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

use super::engine::{EngineCallbacks, EngineEvent, EngineStatistics};
use super::types::{ConnectionState, SessionStatistics};

pub struct EventAdapter {
    /// `None` once the state channel has been closed.
    state_tx: Mutex<Option<UnboundedSender<ConnectionState>>>,
    statistics_tx: UnboundedSender<SessionStatistics>,
}

impl EventAdapter {
    pub fn new(
        state_tx: UnboundedSender<ConnectionState>,
        statistics_tx: UnboundedSender<SessionStatistics>,
    ) -> Self {
        Self {
            state_tx: Mutex::new(Some(state_tx)),
            statistics_tx,
        }
    }

    fn push_state(&self, state: ConnectionState) {
        let slot = self.state_tx.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(tx) => {
                if tx.send(state).is_err() {
                    debug!("State receiver gone, dropping {}", state);
                }
            }
            None => warn!("State channel already closed, dropping {}", state),
        }
    }

    /// Pushes the terminal state and closes the channel, at most once.
    fn close_state(&self) {
        let sender = self
            .state_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                if tx.send(ConnectionState::NotConnected).is_err() {
                    debug!("State receiver gone before disconnect was delivered");
                }
                // dropping the only sender closes the channel
            }
            None => warn!("Repeated disconnect event from engine ignored"),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl EngineCallbacks for EventAdapter {
    fn on_event(&self, event: EngineEvent) {
        match event.name.as_str() {
            "CONNECTING" => self.push_state(ConnectionState::Connecting),
            "CONNECTED" => self.push_state(ConnectionState::Connected),
            "DISCONNECTED" => self.close_state(),
            _ => info!("Unhandled event: {:?}", event),
        }
    }

    fn on_stats(&self, stats: EngineStatistics) {
        let sample = SessionStatistics {
            bytes_sent: stats.bytes_out,
            bytes_received: stats.bytes_in,
        };
        if self.statistics_tx.send(sample).is_err() {
            debug!("Statistics receiver gone, dropping sample");
        }
    }

    fn log(&self, text: &str) {
        info!("Log: {}", text);
    }
}
