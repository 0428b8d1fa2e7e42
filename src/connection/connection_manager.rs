use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::event_bus::EventBus;
use super::registry::{Connection, ConnectionRegistry};
use super::types::{
    BusEvent, ConnectOptions, ConnectionState, SessionInfo, SessionStatistics, StateEvent,
    StatisticsEvent,
};
use crate::error_handling::types::ConnectionError;
use crate::service_management::types::Proposal;

struct ActiveConnection {
    connection: Arc<dyn Connection>,
    session: SessionInfo,
    /// Set once `Disconnecting` has been published for this session.
    disconnecting: Arc<AtomicBool>,
    forwarder: JoinHandle<Result<(), ConnectionError>>,
}

/// Consumer-side owner of the current tunnel connection.
///
/// Engine signals are republished on the [`EventBus`] by one forwarding task
/// per connection, tagged with the session they belong to.
pub struct ConnectionManager {
    registry: Arc<ConnectionRegistry>,
    bus: Arc<EventBus>,
    status: Arc<Mutex<ConnectionState>>,
    active: tokio::sync::Mutex<Option<ActiveConnection>>,
}

impl ConnectionManager {
    pub fn new(registry: Arc<ConnectionRegistry>, bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            bus,
            status: Arc::new(Mutex::new(ConnectionState::NotConnected)),
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Last state published for the current or most recent session.
    pub fn status(&self) -> ConnectionState {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn connect(
        &self,
        consumer_id: &str,
        proposal: Proposal,
        session_config: serde_json::Value,
    ) -> Result<Uuid, ConnectionError> {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            if !current.forwarder.is_finished() {
                return Err(ConnectionError::AlreadyConnected);
            }
        }

        let options = ConnectOptions {
            consumer_id: consumer_id.to_string(),
            session_id: Uuid::new_v4(),
            session_config,
            proposal,
        };
        let session = options.session_info();

        let (state_tx, state_rx) = unbounded_channel();
        let (statistics_tx, statistics_rx) = unbounded_channel();
        let connection: Arc<dyn Connection> =
            Arc::from(self.registry.create(options, state_tx, statistics_tx)?);
        let publisher = Publisher {
            bus: self.bus.clone(),
            status: self.status.clone(),
            session: session.clone(),
        };

        info!(
            "Connecting to {} ({}) as session {}",
            session.proposal.provider_id, session.proposal.service_type, session.session_id
        );
        if let Err(e) = connection.start().await {
            error!("Failed to start connection {}: {}", session.session_id, e);
            publisher.state(ConnectionState::Disconnecting).await;
            publisher.state(ConnectionState::NotConnected).await;
            *active = None;
            return Err(e);
        }

        let disconnecting = Arc::new(AtomicBool::new(false));
        let forwarder = tokio::spawn(forward(
            publisher,
            connection.clone(),
            state_rx,
            statistics_rx,
            disconnecting.clone(),
        ));

        let session_id = session.session_id;
        *active = Some(ActiveConnection {
            connection,
            session,
            disconnecting,
            forwarder,
        });
        Ok(session_id)
    }

    /// Tears the current connection down and waits for the engine to finish.
    ///
    /// Returns the terminal error of the engine session, if any.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let mut active = self.active.lock().await;
        let current = active.take().ok_or(ConnectionError::NotConnected)?;
        if current.forwarder.is_finished() {
            debug!("Session {} already ended", current.session.session_id);
            return Err(ConnectionError::NotConnected);
        }

        info!("Disconnecting session {}", current.session.session_id);
        if !current.disconnecting.swap(true, Ordering::SeqCst) {
            Publisher {
                bus: self.bus.clone(),
                status: self.status.clone(),
                session: current.session.clone(),
            }
            .state(ConnectionState::Disconnecting)
            .await;
        }

        current.connection.stop().await;
        match current.forwarder.await {
            Ok(result) => result,
            Err(e) => {
                error!("Event forwarder for {} failed: {}", current.session.session_id, e);
                Ok(())
            }
        }
    }
}

struct Publisher {
    bus: Arc<EventBus>,
    status: Arc<Mutex<ConnectionState>>,
    session: SessionInfo,
}

impl Publisher {
    async fn state(&self, state: ConnectionState) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.bus
            .publish(BusEvent::State(StateEvent {
                state,
                session: self.session.clone(),
            }))
            .await;
    }

    async fn statistics(&self, stats: SessionStatistics) {
        self.bus
            .publish(BusEvent::Statistics(StatisticsEvent {
                stats,
                session: self.session.clone(),
            }))
            .await;
    }
}

impl Publisher {
    /// Publishes the end of the session: `Disconnecting` unless already sent,
    /// pending statistics, then `NotConnected`.
    async fn finish(
        &self,
        statistics_rx: &mut UnboundedReceiver<SessionStatistics>,
        disconnecting: &AtomicBool,
    ) {
        if !disconnecting.swap(true, Ordering::SeqCst) {
            self.state(ConnectionState::Disconnecting).await;
        }
        while let Ok(stats) = statistics_rx.try_recv() {
            self.statistics(stats).await;
        }
        self.state(ConnectionState::NotConnected).await;
    }
}

/// Republishes engine signals until the session ends and returns the
/// terminal result of [`Connection::wait`].
///
/// The session ends when the engine reports `NotConnected` or when `wait`
/// resolves, whichever comes first. `NotConnected` is published once.
async fn forward(
    publisher: Publisher,
    connection: Arc<dyn Connection>,
    mut state_rx: UnboundedReceiver<ConnectionState>,
    mut statistics_rx: UnboundedReceiver<SessionStatistics>,
    disconnecting: Arc<AtomicBool>,
) -> Result<(), ConnectionError> {
    let session_id = publisher.session.session_id;
    let mut wait = connection.wait();
    let mut outcome = None;
    let mut ended = false;
    let mut statistics_open = true;

    while !ended {
        tokio::select! {
            biased;
            state = state_rx.recv() => match state {
                Some(ConnectionState::NotConnected) => {
                    publisher.finish(&mut statistics_rx, &disconnecting).await;
                    ended = true;
                }
                Some(state) => publisher.state(state).await,
                None => {
                    warn!("State channel of {} closed without a disconnect", session_id);
                    publisher.finish(&mut statistics_rx, &disconnecting).await;
                    ended = true;
                }
            },
            stats = statistics_rx.recv(), if statistics_open => match stats {
                Some(stats) => publisher.statistics(stats).await,
                None => statistics_open = false,
            },
            result = &mut wait => {
                if let Err(e) = &result {
                    warn!("Session {} ended with an error: {}", session_id, e);
                } else {
                    debug!("Session {} ended without a disconnect event", session_id);
                }
                publisher.finish(&mut statistics_rx, &disconnecting).await;
                outcome = Some(result);
                ended = true;
            },
        }
    }

    let result = match outcome {
        Some(result) => result,
        None => wait.await,
    };
    debug!("Event forwarder for {} finished", session_id);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::credentials::{SignatureCredentialProvider, Signer};
    use crate::connection::event_bus::EventSubscriber;
    use crate::connection::factory::{EngineSettings, MobileConnectionFactory};
    use crate::connection::profile::OpenvpnProfileBuilder;
    use crate::connection::testing::{FakeEngine, FakeTunnel};
    use crate::connection::tracker::{ReconnectableSession, SessionTracker};
    use crate::error_handling::types::EngineError;
    use crate::service_management::types::Location;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    struct ZeroSigner;

    impl Signer for ZeroSigner {
        fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, String> {
            Ok(vec![0; 4])
        }
    }

    #[derive(Default)]
    struct StateLog(std::sync::Mutex<Vec<BusEvent>>);

    impl StateLog {
        fn states(&self) -> Vec<ConnectionState> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    BusEvent::State(s) => Some(s.state),
                    _ => None,
                })
                .collect()
        }

        fn statistics(&self) -> Vec<SessionStatistics> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    BusEvent::Statistics(s) => Some(s.stats),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl EventSubscriber for StateLog {
        async fn handle(&self, event: &BusEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    struct Harness {
        engine: Arc<FakeEngine>,
        tracker: Arc<SessionTracker>,
        log: Arc<StateLog>,
        manager: ConnectionManager,
    }

    fn harness(engine: FakeEngine) -> Harness {
        let engine = Arc::new(engine);
        let tracker = Arc::new(SessionTracker::new());
        let registry = Arc::new(ConnectionRegistry::new());
        registry.register(
            "openvpn",
            Arc::new(MobileConnectionFactory::new(
                engine.clone(),
                Arc::new(FakeTunnel),
                tracker.clone(),
                Arc::new(OpenvpnProfileBuilder),
                Arc::new(SignatureCredentialProvider),
                Arc::new(|_: &str| Arc::new(ZeroSigner) as Arc<dyn Signer>),
                EngineSettings::default(),
            )),
        );
        let bus = Arc::new(EventBus::new());
        bus.subscribe(tracker.clone());
        let log = Arc::new(StateLog::default());
        bus.subscribe(log.clone());
        Harness {
            engine,
            tracker,
            log,
            manager: ConnectionManager::new(registry, bus),
        }
    }

    fn proposal(service_type: &str) -> Proposal {
        Proposal {
            provider_id: "0xprovider".into(),
            service_type: service_type.into(),
            location: Location {
                country: "LT".into(),
                city: "Vilnius".into(),
            },
        }
    }

    fn session_config() -> serde_json::Value {
        json!({"remote": "10.0.0.1", "port": 1194, "caCertificate": "CA"})
    }

    async fn settle(log: &StateLog, expected: usize) {
        for _ in 0..100 {
            if log.states().len() >= expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("only saw {:?}", log.states());
    }

    #[tokio::test]
    async fn consumer_disconnect_publishes_full_lifecycle() {
        let h = harness(FakeEngine::default());
        assert_eq!(h.manager.status(), ConnectionState::NotConnected);

        assert_ok!(
            h.manager
                .connect("0xconsumer", proposal("openvpn"), session_config())
                .await
        );
        let session = h.engine.last_session();
        session.emit("CONNECTING");
        session.emit("CONNECTED");
        settle(&h.log, 2).await;
        assert_eq!(h.manager.status(), ConnectionState::Connected);
        assert!(h.tracker.has_session());

        assert_ok!(h.manager.disconnect().await);
        assert_eq!(
            h.log.states(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnecting,
                ConnectionState::NotConnected
            ]
        );
        assert!(!h.tracker.has_session());
        assert_eq!(h.tracker.reconnect(1), Err(ConnectionError::NoActiveSession));
        assert_eq!(h.manager.status(), ConnectionState::NotConnected);
    }

    #[tokio::test]
    async fn engine_side_disconnect_inserts_disconnecting() {
        let h = harness(FakeEngine::default());
        h.manager
            .connect("0xconsumer", proposal("openvpn"), session_config())
            .await
            .unwrap();
        let session = h.engine.last_session();
        session.emit("CONNECTED");
        session.stats(200, 100);
        session.emit("DISCONNECTED");
        settle(&h.log, 3).await;

        assert_eq!(
            h.log.states(),
            vec![
                ConnectionState::Connected,
                ConnectionState::Disconnecting,
                ConnectionState::NotConnected
            ]
        );
        assert_eq!(
            h.log.statistics(),
            vec![SessionStatistics {
                bytes_sent: 100,
                bytes_received: 200
            }]
        );
        assert!(!h.tracker.has_session());
    }

    #[tokio::test]
    async fn second_connect_is_rejected_while_active() {
        let h = harness(FakeEngine::default());
        h.manager
            .connect("0xconsumer", proposal("openvpn"), session_config())
            .await
            .unwrap();

        let err = assert_err!(
            h.manager
                .connect("0xconsumer", proposal("openvpn"), session_config())
                .await
        );
        assert_eq!(err, ConnectionError::AlreadyConnected);
        assert_eq!(h.engine.sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_without_connection_fails() {
        let h = harness(FakeEngine::default());
        assert_eq!(
            h.manager.disconnect().await,
            Err(ConnectionError::NotConnected)
        );
    }

    #[tokio::test]
    async fn unknown_service_type_is_rejected() {
        let h = harness(FakeEngine::default());
        let err = assert_err!(
            h.manager
                .connect("0xconsumer", proposal("wireguard"), session_config())
                .await
        );
        assert_eq!(err, ConnectionError::UnknownServiceType("wireguard".into()));
        assert!(h.log.states().is_empty());
    }

    #[tokio::test]
    async fn failed_start_releases_the_session() {
        let h = harness(FakeEngine {
            start_error: Some(EngineError::new("tun unavailable")),
            ..Default::default()
        });
        let err = assert_err!(
            h.manager
                .connect("0xconsumer", proposal("openvpn"), session_config())
                .await
        );
        assert_eq!(err, ConnectionError::Engine(EngineError::new("tun unavailable")));
        assert!(!h.tracker.has_session());
        assert_eq!(
            h.log.states(),
            vec![ConnectionState::Disconnecting, ConnectionState::NotConnected]
        );

        // A fresh attempt is allowed afterwards.
        assert!(matches!(
            h.manager
                .connect("0xconsumer", proposal("openvpn"), session_config())
                .await,
            Err(ConnectionError::Engine(_))
        ));
    }

    #[tokio::test]
    async fn disconnect_returns_terminal_error_without_disconnected_event() {
        let h = harness(FakeEngine {
            silent_stop: true,
            wait_error: Some(EngineError::new("fatal")),
            ..Default::default()
        });
        h.manager
            .connect("0xconsumer", proposal("openvpn"), session_config())
            .await
            .unwrap();
        h.engine.last_session().emit("CONNECTING");
        settle(&h.log, 1).await;

        let result = tokio::time::timeout(Duration::from_secs(2), h.manager.disconnect())
            .await
            .expect("disconnect hung");
        assert_eq!(
            result,
            Err(ConnectionError::Engine(EngineError::new("fatal")))
        );
        assert_eq!(
            h.log.states(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Disconnecting,
                ConnectionState::NotConnected
            ]
        );
        assert!(!h.tracker.has_session());

        // The slot is free again.
        assert_ok!(
            h.manager
                .connect("0xconsumer", proposal("openvpn"), session_config())
                .await
        );
    }

    #[tokio::test]
    async fn engine_ending_silently_releases_the_slot() {
        let h = harness(FakeEngine::default());
        h.manager
            .connect("0xconsumer", proposal("openvpn"), session_config())
            .await
            .unwrap();
        let session = h.engine.last_session();
        session.emit("CONNECTED");
        session.stats(10, 20);
        session.end();
        settle(&h.log, 3).await;
        tokio::task::yield_now().await;

        assert_eq!(
            h.log.states(),
            vec![
                ConnectionState::Connected,
                ConnectionState::Disconnecting,
                ConnectionState::NotConnected
            ]
        );
        assert_eq!(h.log.statistics().len(), 1);
        assert_eq!(h.manager.status(), ConnectionState::NotConnected);
        assert_eq!(
            h.manager.disconnect().await,
            Err(ConnectionError::NotConnected)
        );
        assert_ok!(
            h.manager
                .connect("0xconsumer", proposal("openvpn"), session_config())
                .await
        );
        assert_eq!(h.engine.sessions.lock().unwrap().len(), 2);
    }
}
