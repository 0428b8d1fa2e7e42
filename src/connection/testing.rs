//! In-process engine double shared by the connection tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::engine::{
    EngineCallbacks, EngineConfig, EngineEvent, EngineStatistics, NativeEngine, NativeSession,
    TunnelSetup, UserCredentials,
};
use crate::error_handling::types::EngineError;

pub(crate) struct FakeSession {
    pub callbacks: Arc<dyn EngineCallbacks>,
    pub config: EngineConfig,
    pub credentials: UserCredentials,
    pub starts: AtomicUsize,
    pub start_error: Option<EngineError>,
    pub reconnects: Mutex<Vec<u32>>,
    pub reconnect_error: Option<EngineError>,
    silent_stop: bool,
    wait_error: Option<EngineError>,
    stopped: watch::Sender<bool>,
}

impl FakeSession {
    pub fn emit(&self, name: &str) {
        if name == "DISCONNECTED" {
            self.stopped.send_replace(true);
        }
        self.callbacks.on_event(EngineEvent::named(name));
    }

    /// Ends the session without reporting DISCONNECTED.
    pub fn end(&self) {
        self.stopped.send_replace(true);
    }

    pub fn stats(&self, bytes_in: u64, bytes_out: u64) {
        self.callbacks.on_stats(EngineStatistics {
            bytes_in,
            bytes_out,
        });
    }
}

#[async_trait]
impl NativeSession for FakeSession {
    fn start(&self) -> Result<(), EngineError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match &self.start_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn stop(&self) {
        if self.silent_stop {
            self.end();
            return;
        }
        let first = self.stopped.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if first {
            self.emit("DISCONNECTED");
        }
    }

    async fn wait(&self) -> Result<(), EngineError> {
        let mut rx = self.stopped.subscribe();
        rx.wait_for(|stopped| *stopped)
            .await
            .map_err(|_| EngineError::new("engine dropped"))?;
        match &self.wait_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn reconnect(&self, after_seconds: u32) -> Result<(), EngineError> {
        self.reconnects.lock().unwrap().push(after_seconds);
        match &self.reconnect_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    pub sessions: Mutex<Vec<Arc<FakeSession>>>,
    pub start_error: Option<EngineError>,
    pub reconnect_error: Option<EngineError>,
    /// `stop` ends the session without emitting DISCONNECTED
    pub silent_stop: bool,
    pub wait_error: Option<EngineError>,
}

impl FakeEngine {
    pub fn last_session(&self) -> Arc<FakeSession> {
        self.sessions
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no session created")
    }
}

impl NativeEngine for FakeEngine {
    fn new_session(
        &self,
        config: EngineConfig,
        credentials: UserCredentials,
        callbacks: Arc<dyn EngineCallbacks>,
        _tunnel_setup: Arc<dyn TunnelSetup>,
    ) -> Arc<dyn NativeSession> {
        let (stopped, _) = watch::channel(false);
        let session = Arc::new(FakeSession {
            callbacks,
            config,
            credentials,
            starts: AtomicUsize::new(0),
            start_error: self.start_error.clone(),
            reconnects: Mutex::new(Vec::new()),
            reconnect_error: self.reconnect_error.clone(),
            silent_stop: self.silent_stop,
            wait_error: self.wait_error.clone(),
            stopped,
        });
        self.sessions.lock().unwrap().push(session.clone());
        session
    }
}

pub(crate) struct FakeTunnel;

impl TunnelSetup for FakeTunnel {
    fn protect(&self, _socket: i32) -> bool {
        true
    }

    fn establish(&self) -> Result<i32, EngineError> {
        Ok(3)
    }
}
