//! Shared fixtures for executor integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    DataPlugin, DateContext, FetchError, FetcherConfig, PluginDescriptor, PluginName, PluginPhase,
    Plugin, RuntimeContext, SourceConfig, SourceKind,
};
use serde_json::{json, Value};
use tokio::time::Instant;

pub fn descriptor(name: &str, phase: PluginPhase) -> PluginDescriptor {
    PluginDescriptor {
        name: PluginName::new(name).unwrap(),
        version: "1.0.0".to_string(),
        compatible_contracts: "^1.0.0".to_string(),
        phase,
    }
}

pub fn context() -> RuntimeContext {
    RuntimeContext::new(DateContext::parse("2024-05-01").unwrap())
}

pub fn fetcher(value: Value) -> FetcherConfig {
    serde_json::from_value(value).unwrap()
}

/// Data plugin scripted by the inline payload of each fetcher:
///
/// - `key`: name used in the call log and failure counters,
/// - `value`: payload returned on success,
/// - `fail`: failure message; every attempt fails,
/// - `failTimes`: number of leading attempts that fail,
/// - `delayMs`: simulated I/O wait before settling,
/// - `hang`: never settles.
pub struct ScriptedSource {
    descriptor: PluginDescriptor,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, Instant)>>,
    finished: Mutex<Vec<(String, Instant)>>,
    failures: Mutex<HashMap<String, u64>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            descriptor: descriptor("scripted-source", PluginPhase::Data),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Attempt start times, in call order.
    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<(String, Instant)> {
        self.finished.lock().unwrap().clone()
    }

    pub fn calls_for(&self, key: &str) -> Vec<Instant> {
        self.calls()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, at)| at)
            .collect()
    }
}

impl Plugin for ScriptedSource {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl DataPlugin for ScriptedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Inline
    }

    async fn fetch(&self, source: &SourceConfig, _ctx: &RuntimeContext) -> Result<Value, FetchError> {
        let SourceConfig::Inline { data } = source else {
            return Err(FetchError::failed(SourceKind::Inline, "unexpected source"));
        };
        let key = data["key"].as_str().unwrap_or("anonymous").to_string();
        self.calls.lock().unwrap().push((key.clone(), Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if data["hang"].as_bool() == Some(true) {
            std::future::pending::<()>().await;
        }
        if let Some(ms) = data["delayMs"].as_u64() {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push((key.clone(), Instant::now()));

        if let Some(message) = data["fail"].as_str() {
            return Err(FetchError::failed(SourceKind::Inline, message));
        }
        if let Some(times) = data["failTimes"].as_u64() {
            let mut failures = self.failures.lock().unwrap();
            let seen = failures.entry(key.clone()).or_insert(0);
            if *seen < times {
                *seen += 1;
                return Err(FetchError::failed(
                    SourceKind::Inline,
                    format!("{key} attempt {seen} failed"),
                ));
            }
        }
        Ok(data.get("value").cloned().unwrap_or(json!(null)))
    }
}
