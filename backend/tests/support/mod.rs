//! Shared fixtures for the integration tests: a scriptable controller-service double, a
//! reversible test cipher and builders for execution rows.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::jobs::ExecutionStatus;
use common::model::feed::{ExecutedFeed, ExecutedJob};
use feedmgr::cipher::{CipherError, TextCipher};
use feedmgr::config::Config;
use feedmgr::controller::state::InMemoryControllerServices;
use feedmgr::controller::{ControllerService, ControllerServiceSpec, ControllerServices, RemoteError, ServiceState};
use feedmgr::FeedManager;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Controller operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Find,
    Create,
    Update,
    Disable,
    Enable,
    DisableAndDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(String),
    Create(String),
    Update(String),
    Disable(String),
    Enable(String),
    DisableAndDelete(String),
}

/// Wraps `InMemoryControllerServices` with injectable faults and a journal of every call.
pub struct ScriptedControllerServices {
    pub registry: InMemoryControllerServices,
    faults: Mutex<HashMap<Op, RemoteError>>,
    journal: Mutex<Vec<Call>>,
    cleanup_tx: Mutex<Sender<String>>,
    cleanup_rx: Mutex<Receiver<String>>,
}

impl ScriptedControllerServices {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            registry: InMemoryControllerServices::new(),
            faults: Mutex::new(HashMap::new()),
            journal: Mutex::new(Vec::new()),
            cleanup_tx: Mutex::new(tx),
            cleanup_rx: Mutex::new(rx),
        }
    }

    /// Makes every following call of `op` fail with `error` until `clear_faults`.
    pub fn fail(&self, op: Op, error: RemoteError) {
        self.faults.lock().unwrap().insert(op, error);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().unwrap().clear();
    }

    pub fn journal(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap().clear();
    }

    /// Waits for a background `disable_and_delete` and returns the id it was called with.
    pub fn wait_for_cleanup(&self, timeout: StdDuration) -> Option<String> {
        self.cleanup_rx.lock().unwrap().recv_timeout(timeout).ok()
    }

    fn record(&self, op: Op, call: Call) -> Result<(), RemoteError> {
        self.journal.lock().unwrap().push(call);
        match self.faults.lock().unwrap().get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl ControllerServices for ScriptedControllerServices {
    fn find_by_id(&self, id: &str) -> Result<Option<ControllerService>, RemoteError> {
        self.record(Op::Find, Call::Find(id.to_string()))?;
        self.registry.find_by_id(id)
    }

    fn create(&self, spec: &ControllerServiceSpec) -> Result<ControllerService, RemoteError> {
        self.record(Op::Create, Call::Create(spec.name.clone()))?;
        self.registry.create(spec)
    }

    fn update(&self, id: &str, spec: &ControllerServiceSpec) -> Result<ControllerService, RemoteError> {
        self.record(Op::Update, Call::Update(id.to_string()))?;
        self.registry.update(id, spec)
    }

    fn update_state_by_id(&self, id: &str, state: ServiceState) -> Result<ControllerService, RemoteError> {
        match state {
            ServiceState::Disabled => self.record(Op::Disable, Call::Disable(id.to_string()))?,
            ServiceState::Enabled => self.record(Op::Enable, Call::Enable(id.to_string()))?,
        }
        self.registry.update_state_by_id(id, state)
    }

    fn disable_and_delete(&self, id: &str) -> Result<(), RemoteError> {
        let outcome = self
            .record(Op::DisableAndDelete, Call::DisableAndDelete(id.to_string()))
            .and_then(|_| self.registry.disable_and_delete(id));
        let _ = self.cleanup_tx.lock().unwrap().send(id.to_string());
        outcome
    }
}

/// Reversible cipher for tests: `b64:` followed by the base64 of the plaintext.
pub struct Base64Cipher;

const PREFIX: &str = "b64:";

impl TextCipher for Base64Cipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        Ok(format!("{}{}", PREFIX, STANDARD.encode(plaintext)))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let encoded = ciphertext
            .strip_prefix(PREFIX)
            .ok_or_else(|| CipherError::decrypt("missing prefix"))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CipherError::decrypt(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| CipherError::decrypt(e.to_string()))
    }
}

pub struct Fixture {
    pub manager: FeedManager,
    pub controller: Arc<ScriptedControllerServices>,
}

pub fn fixture() -> Fixture {
    init_logging();
    let controller = Arc::new(ScriptedControllerServices::new());
    let manager = FeedManager::new(
        &Config::in_memory(),
        Arc::clone(&controller) as Arc<dyn ControllerServices>,
        Arc::new(Base64Cipher),
    )
    .unwrap();
    Fixture { manager, controller }
}

pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
}

/// A feed execution that started at `start` minutes and ran for `minutes`.
pub fn executed_feed(id: i64, name: &str, status: ExecutionStatus, start: i64, minutes: i64) -> ExecutedFeed {
    ExecutedFeed {
        feed_execution_id: id,
        feed_instance_id: id * 10,
        feed_name: name.to_string(),
        status,
        exit_code: Some(status.as_str().to_string()),
        exit_message: None,
        start_time: Some(at(start)),
        end_time: status.is_finished().then(|| at(start + minutes)),
    }
}

pub fn executed_job(id: i64, feed: &ExecutedFeed, job_name: &str, status: ExecutionStatus) -> ExecutedJob {
    ExecutedJob {
        job_execution_id: id,
        job_instance_id: id * 10,
        feed_execution_id: feed.feed_execution_id,
        job_name: job_name.to_string(),
        feed_name: feed.feed_name.clone(),
        status,
        exit_code: None,
        exit_message: None,
        start_time: feed.start_time,
        end_time: feed.end_time,
    }
}
