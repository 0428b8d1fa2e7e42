use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::types::History;
use crate::connection::event_bus::EventSubscriber;
use crate::connection::types::{
    BusEvent, ConnectionState, SessionStatistics, StateEvent, StatisticsEvent,
};
use crate::storage::storage_trait::HistoryStorage;

#[derive(Default)]
struct Tracked {
    record: Option<History>,
    stats: SessionStatistics,
}

/// Bus subscriber persisting one [`History`] per consumer session.
///
/// The record is created on the first `Connected` of a session and
/// completed with the latest statistics sample on `NotConnected`. Storage
/// failures are logged and never propagate into the session.
pub struct HistoryRecorder {
    storage: Arc<dyn HistoryStorage>,
    sessions: Mutex<HashMap<Uuid, Tracked>>,
    clock: Clock,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

impl HistoryRecorder {
    pub fn new(storage: Arc<dyn HistoryStorage>) -> Self {
        Self::with_clock(storage, Arc::new(Utc::now))
    }

    pub(crate) fn with_clock(storage: Arc<dyn HistoryStorage>, clock: Clock) -> Self {
        Self {
            storage,
            sessions: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, Tracked>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn save(&self, record: &History) {
        if let Err(e) = self.storage.save(record).await {
            error!(
                "Failed to save history of session {}: {}",
                record.session_id, e
            );
        }
    }

    async fn on_state(&self, event: &StateEvent) {
        let session_id = event.session.session_id;
        match event.state {
            ConnectionState::Connecting => {
                self.sessions().entry(session_id).or_default();
            }
            ConnectionState::Connected => {
                let created = {
                    let mut sessions = self.sessions();
                    let tracked = sessions.entry(session_id).or_default();
                    if tracked.record.is_some() {
                        None
                    } else {
                        let record =
                            History::new_at(session_id, &event.session.proposal, (self.clock)());
                        tracked.record = Some(record.clone());
                        Some(record)
                    }
                };
                if let Some(record) = created {
                    info!("Session {} connected, recording history", session_id);
                    self.save(&record).await;
                }
            }
            ConnectionState::Disconnecting => {}
            ConnectionState::NotConnected => {
                let Some(tracked) = self.sessions().remove(&session_id) else {
                    debug!("No tracked history for session {}", session_id);
                    return;
                };
                let Some(mut record) = tracked.record else {
                    debug!("Session {} ended before connecting", session_id);
                    return;
                };
                if let Err(e) = record.complete_at(tracked.stats, (self.clock)()) {
                    warn!("{}", e);
                    return;
                }
                info!(
                    "Session {} completed after {}s ({} B sent, {} B received)",
                    session_id,
                    record.duration(),
                    record.data_stats.bytes_sent,
                    record.data_stats.bytes_received
                );
                self.save(&record).await;
            }
        }
    }

    fn on_statistics(&self, event: &StatisticsEvent) {
        if let Some(tracked) = self.sessions().get_mut(&event.session.session_id) {
            tracked.stats = event.stats;
        }
    }
}

#[async_trait]
impl EventSubscriber for HistoryRecorder {
    async fn handle(&self, event: &BusEvent) {
        match event {
            BusEvent::State(e) => self.on_state(e).await,
            BusEvent::Statistics(e) => self.on_statistics(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::types::SessionInfo;
    use crate::error_handling::types::StorageError;
    use crate::history::types::HistoryStatus;
    use crate::service_management::types::{Location, Proposal};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    #[derive(Default)]
    struct MemoryStorage {
        saves: Mutex<Vec<History>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl HistoryStorage for MemoryStorage {
        async fn save(&self, record: &History) -> Result<(), StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::WriteFailed);
            }
            self.saves.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn get(&self, session_id: Uuid) -> Result<History, StorageError> {
            self.saves
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| r.session_id == session_id)
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        async fn list(&self) -> Result<Vec<History>, StorageError> {
            Ok(self.saves.lock().unwrap().clone())
        }
    }

    fn session() -> SessionInfo {
        SessionInfo {
            session_id: Uuid::new_v4(),
            consumer_id: "0xconsumer".into(),
            proposal: Proposal {
                provider_id: "0xprovider".into(),
                service_type: "openvpn".into(),
                location: Location {
                    country: "DE".into(),
                    city: "Berlin".into(),
                },
            },
        }
    }

    fn state(session: &SessionInfo, state: ConnectionState) -> BusEvent {
        BusEvent::State(StateEvent {
            state,
            session: session.clone(),
        })
    }

    fn stats(session: &SessionInfo, sent: u64, received: u64) -> BusEvent {
        BusEvent::Statistics(StatisticsEvent {
            stats: SessionStatistics {
                bytes_sent: sent,
                bytes_received: received,
            },
            session: session.clone(),
        })
    }

    #[tokio::test]
    async fn full_lifecycle_yields_one_completion() {
        let storage = Arc::new(MemoryStorage::default());
        let recorder = HistoryRecorder::new(storage.clone());
        let s = session();

        recorder.handle(&state(&s, ConnectionState::Connecting)).await;
        recorder.handle(&state(&s, ConnectionState::Connected)).await;
        recorder.handle(&stats(&s, 10, 20)).await;
        recorder.handle(&stats(&s, 15, 40)).await;
        recorder.handle(&state(&s, ConnectionState::Disconnecting)).await;
        recorder.handle(&state(&s, ConnectionState::NotConnected)).await;
        recorder.handle(&state(&s, ConnectionState::NotConnected)).await;

        let saves = storage.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].status, HistoryStatus::New);
        assert_eq!(saves[0].provider_country, "DE");

        let completed: Vec<_> = saves
            .iter()
            .filter(|r| r.status == HistoryStatus::Completed)
            .collect();
        assert_eq!(completed.len(), 1);
        assert_eq!(
            completed[0].data_stats,
            SessionStatistics {
                bytes_sent: 15,
                bytes_received: 40
            }
        );
    }

    #[tokio::test]
    async fn completed_record_spans_connected_to_not_connected() {
        let storage = Arc::new(MemoryStorage::default());
        let now = Arc::new(AtomicI64::new(1_700_000_000));
        let clock = now.clone();
        let recorder = HistoryRecorder::with_clock(
            storage.clone(),
            Arc::new(move || {
                Utc.timestamp_opt(clock.load(Ordering::SeqCst), 0)
                    .single()
                    .unwrap()
            }),
        );
        let s = session();

        recorder.handle(&state(&s, ConnectionState::Connecting)).await;
        recorder.handle(&state(&s, ConnectionState::Connected)).await;
        now.fetch_add(95, Ordering::SeqCst);
        recorder.handle(&state(&s, ConnectionState::Disconnecting)).await;
        recorder.handle(&state(&s, ConnectionState::NotConnected)).await;

        let record = storage.get(s.session_id).await.unwrap();
        assert_eq!(record.status, HistoryStatus::Completed);
        assert_eq!(record.duration(), 95);
        assert!(record.duration() > 0);
    }

    #[tokio::test]
    async fn repeated_connected_creates_one_record() {
        let storage = Arc::new(MemoryStorage::default());
        let recorder = HistoryRecorder::new(storage.clone());
        let s = session();

        recorder.handle(&state(&s, ConnectionState::Connected)).await;
        recorder.handle(&state(&s, ConnectionState::Connected)).await;
        assert_eq!(storage.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn session_that_never_connected_leaves_no_record() {
        let storage = Arc::new(MemoryStorage::default());
        let recorder = HistoryRecorder::new(storage.clone());
        let s = session();

        recorder.handle(&state(&s, ConnectionState::Connecting)).await;
        recorder.handle(&stats(&s, 1, 1)).await;
        recorder.handle(&state(&s, ConnectionState::NotConnected)).await;
        assert!(storage.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_kept_apart() {
        let storage = Arc::new(MemoryStorage::default());
        let recorder = HistoryRecorder::new(storage.clone());
        let a = session();
        let b = session();

        recorder.handle(&state(&a, ConnectionState::Connected)).await;
        recorder.handle(&state(&b, ConnectionState::Connected)).await;
        recorder.handle(&stats(&a, 1, 2)).await;
        recorder.handle(&stats(&b, 3, 4)).await;
        recorder.handle(&state(&b, ConnectionState::NotConnected)).await;

        let b_record = storage.get(b.session_id).await.unwrap();
        assert_eq!(b_record.status, HistoryStatus::Completed);
        assert_eq!(b_record.data_stats.bytes_sent, 3);
        let a_record = storage.get(a.session_id).await.unwrap();
        assert_eq!(a_record.status, HistoryStatus::New);
    }

    #[tokio::test]
    async fn storage_failure_does_not_stop_recording() {
        let storage = Arc::new(MemoryStorage::default());
        storage.failing.store(true, Ordering::SeqCst);
        let recorder = HistoryRecorder::new(storage.clone());
        let s = session();

        recorder.handle(&state(&s, ConnectionState::Connected)).await;
        storage.failing.store(false, Ordering::SeqCst);
        recorder.handle(&state(&s, ConnectionState::NotConnected)).await;

        let saved = storage.get(s.session_id).await.unwrap();
        assert_eq!(saved.status, HistoryStatus::Completed);
    }
}
