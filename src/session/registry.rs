//! Session registry: creates sessions, hands out their ids and answers
//! status polls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::{EventRequest, HistoricRequest};
use crate::error::{Error, Result};
use crate::session::{EventSession, HistoricSession, SessionStatus};
use crate::storage::DataStore;

/// Owns the id -> session table. Constructed once by the surrounding
/// service; sessions run on their own background threads and are never
/// explicitly destroyed.
pub struct SessionRegistry {
    cfg: EngineConfig,
    store: Arc<dyn DataStore>,
    sessions: Mutex<HashMap<String, Arc<RwLock<SessionStatus>>>>,
}

impl SessionRegistry {
    pub fn new(cfg: EngineConfig, store: Arc<dyn DataStore>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg, store, sessions: Mutex::new(HashMap::new()) })
    }

    /// Starts a historic-grid generation session and returns its id
    /// immediately; progress is observed through [`SessionRegistry::status`].
    pub fn start_historic(&self, req: HistoricRequest) -> String {
        let (id, status) = self.register();
        let session =
            HistoricSession::new(self.cfg.clone(), req, Arc::clone(&self.store), status);
        thread::spawn(move || session.run());
        id
    }

    /// Starts an event-detection session and returns its id immediately.
    pub fn start_event(&self, req: EventRequest) -> String {
        let (id, status) = self.register();
        let session = EventSession::new(self.cfg.clone(), req, Arc::clone(&self.store), status);
        thread::spawn(move || session.run());
        id
    }

    /// Current status of a session: its label and whether it reached a
    /// terminal state.
    pub fn status(&self, id: &str) -> Result<(&'static str, bool)> {
        let sessions = self.sessions.lock().unwrap();
        let status = sessions.get(id).ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        let current = *status.read().unwrap();
        Ok((current.label(), current.is_terminal()))
    }

    fn register(&self) -> (String, Arc<RwLock<SessionStatus>>) {
        let id = Uuid::new_v4().to_string();
        let status = Arc::new(RwLock::new(SessionStatus::Running));
        self.sessions.lock().unwrap().insert(id.clone(), Arc::clone(&status));
        (id, status)
    }
}
