//! Recording [`OvhApi`] double for unit tests.

use super::OvhApi;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// One call made against the API.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

impl Call {
    pub fn get(path: &str) -> Self {
        Self { method: "GET", path: path.to_string(), body: None }
    }

    pub fn post(path: &str, body: Option<Value>) -> Self {
        Self { method: "POST", path: path.to_string(), body }
    }

    pub fn put(path: &str, body: Value) -> Self {
        Self { method: "PUT", path: path.to_string(), body: Some(body) }
    }

    pub fn delete(path: &str) -> Self {
        Self { method: "DELETE", path: path.to_string(), body: None }
    }
}

struct Rule {
    method: &'static str,
    fragment: &'static str,
    reply: Option<Value>,
}

/// Logs every call; replies come from the first rule whose method matches
/// and whose fragment appears in the path, `null` otherwise.
#[derive(Clone, Default)]
pub(crate) struct RecordingApi {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(self, method: &'static str, fragment: &'static str, reply: Option<Value>) -> Self {
        self.rules.lock().unwrap().push(Rule { method, fragment, reply });
        self
    }

    pub fn reply_get(self, fragment: &'static str, reply: Value) -> Self {
        self.rule("GET", fragment, Some(reply))
    }

    pub fn reply_post(self, fragment: &'static str, reply: Value) -> Self {
        self.rule("POST", fragment, Some(reply))
    }

    pub fn fail_get(self, fragment: &'static str) -> Self {
        self.rule("GET", fragment, None)
    }

    pub fn fail_post(self, fragment: &'static str) -> Self {
        self.rule("POST", fragment, None)
    }

    pub fn fail_put(self, fragment: &'static str) -> Self {
        self.rule("PUT", fragment, None)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    pub fn posts(&self) -> usize {
        self.count("POST")
    }

    pub fn puts(&self) -> usize {
        self.count("PUT")
    }

    /// Calls that write to the zone: create, update, delete or refresh.
    pub fn writes(&self) -> usize {
        self.calls().iter().filter(|c| c.method != "GET").count()
    }

    fn answer(&self, call: Call) -> Result<Value> {
        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.method == call.method && call.path.contains(r.fragment))
            .map(|r| r.reply.clone());
        self.calls.lock().unwrap().push(call);

        match reply {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(DdnsError::Api {
                status: 500,
                message: "api error".to_string(),
            }),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl OvhApi for RecordingApi {
    async fn get(&self, path: &str) -> Result<Value> {
        self.answer(Call::get(path))
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.answer(Call::post(path, body.cloned()))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.answer(Call::put(path, body.clone()))
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.answer(Call::delete(path))
    }
}
