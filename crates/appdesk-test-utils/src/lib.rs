//! Testing utilities for the appdesk workspace
//!
//! An in-memory applications server with the review lock rules, wire fixtures and identity
//! builders. Responses can be failed or held back to reproduce out-of-order resolution.

#![allow(missing_docs)]

use appdesk_access::Identity;
use appdesk_core::{ApiError, ApplicationsApi, ListResponse};
use appdesk_row::{FieldPatch, ServerId, UserId};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Collaborator operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FetchAll,
    FetchOne,
    Create,
    Update,
}

/// A request the server received
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: Op,
    pub actor: UserId,
    pub id: Option<String>,
    pub body: Option<Value>,
}

/// Handle on a held response
///
/// The held call waits until [`Gate::release`] (or until the gate is dropped).
#[derive(Debug)]
pub struct Gate {
    release: oneshot::Sender<()>,
    arrived: Arc<Notify>,
}

impl Gate {
    /// Wait until the held call has reached the server
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    /// Let the held call finish
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Debug)]
struct Hold {
    release: oneshot::Receiver<()>,
    arrived: Arc<Notify>,
}

impl Hold {
    async fn wait(self) {
        self.arrived.notify_one();
        let _ = self.release.await;
    }
}

#[derive(Debug, Default)]
struct ServerState {
    docs: Vec<Value>,
    meta: Value,
    next_id: u64,
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<ApiError>>,
    holds: HashMap<Op, VecDeque<Hold>>,
}

impl ServerState {
    fn position(&self, id: &str) -> Option<usize> {
        self.docs.iter().position(|doc| doc["_id"] == id)
    }
}

/// In-memory applications server shared by any number of clients
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document (builder form)
    pub fn with_application(self, doc: Value) -> Self {
        self.insert(doc);
        self
    }

    /// Set the `meta` object returned with every list (builder form)
    pub fn with_meta(self, meta: Value) -> Self {
        self.set_meta(meta);
        self
    }

    /// Replace the `meta` object
    pub fn set_meta(&self, meta: Value) {
        self.state.lock().meta = meta;
    }

    /// Add or replace a document
    pub fn insert(&self, doc: Value) {
        let mut state = self.state.lock();
        let id = doc["_id"].as_str().unwrap_or_default().to_string();
        match state.position(&id) {
            Some(index) => state.docs[index] = doc,
            None => state.docs.push(doc),
        }
    }

    /// Delete a document
    pub fn remove(&self, id: &str) {
        let mut state = self.state.lock();
        if let Some(index) = state.position(id) {
            state.docs.remove(index);
        }
    }

    /// Change one field as another user would
    pub fn set_field(&self, id: &str, key: &str, value: Value) {
        let mut state = self.state.lock();
        if let Some(index) = state.position(id) {
            state.docs[index][key] = value;
        }
    }

    /// Current server copy of a document
    pub fn document(&self, id: &str) -> Option<Value> {
        let state = self.state.lock();
        state.position(id).map(|index| state.docs[index].clone())
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Requests of one kind
    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.op == op).collect()
    }

    /// Fail the next `op` with `error`
    pub fn fail_next(&self, op: Op, error: ApiError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Hold the next `op` until the returned gate is released
    ///
    /// A held fetch answers with the documents as they were when it arrived. A held create or
    /// update is processed when it is released.
    pub fn hold_next(&self, op: Op) -> Gate {
        let (release, receiver) = oneshot::channel();
        let arrived = Arc::new(Notify::new());
        self.state.lock().holds.entry(op).or_default().push_back(Hold {
            release: receiver,
            arrived: Arc::clone(&arrived),
        });
        Gate { release, arrived }
    }

    /// Client acting as `identity`
    pub fn client(&self, identity: &Identity) -> FakeClient {
        FakeClient {
            server: self.clone(),
            actor: json!({"_id": identity.id.as_str(), "name": identity.name}),
        }
    }

    fn begin(&self, call: Call) -> (Option<Hold>, Option<ApiError>) {
        let mut state = self.state.lock();
        let op = call.op;
        state.calls.push(call);
        let hold = state.holds.get_mut(&op).and_then(VecDeque::pop_front);
        let failure = state.failures.get_mut(&op).and_then(VecDeque::pop_front);
        (hold, failure)
    }

    fn list(&self) -> ListResponse {
        let state = self.state.lock();
        ListResponse {
            items: state.docs.clone(),
            meta: serde_json::from_value(state.meta.clone()).unwrap_or_default(),
        }
    }

    fn get(&self, id: &str) -> Result<Value, ApiError> {
        self.document(id)
            .ok_or_else(|| ApiError::status(404, "Application not found"))
    }

    fn create(&self, body: &Value) -> Value {
        let mut state = self.state.lock();
        state.next_id += 1;
        let mut doc = json!({
            "_id": format!("app-{}", state.next_id),
            "checkStatus": "pending",
            "checkResult": "pending",
            "checkNote": "",
            "createdAt": now(),
        });
        merge(&mut doc, body);
        state.docs.push(doc.clone());
        doc
    }

    fn update(&self, id: &str, body: &Value, actor: &Value) -> Result<Value, ApiError> {
        let mut state = self.state.lock();
        let index = state
            .position(id)
            .ok_or_else(|| ApiError::status(404, "Application not found"))?;
        let doc = &mut state.docs[index];

        if let Some(target) = body.get("checkStatus").and_then(Value::as_str) {
            let current = doc["checkStatus"].as_str().unwrap_or("pending").to_string();
            let holder = doc["checkedBy"]["_id"].as_str().map(str::to_string);
            let is_holder = holder.is_none() || holder.as_deref() == actor["_id"].as_str();
            match target {
                "in_review" => {
                    if current != "pending" {
                        return Err(ApiError::status(409, "Application is already being reviewed"));
                    }
                    doc["checkedBy"] = actor.clone();
                }
                "reviewed" => {
                    if current != "in_review" || !is_holder {
                        return Err(ApiError::status(
                            409,
                            "Only the assigned checker can complete this review",
                        ));
                    }
                    doc["checkedAt"] = json!(now());
                }
                "pending" => {
                    if current != "in_review" || !is_holder {
                        return Err(ApiError::status(
                            409,
                            "Only the assigned checker can cancel this review",
                        ));
                    }
                    doc["checkedBy"] = Value::Null;
                    doc["checkResult"] = json!("pending");
                    doc["checkNote"] = json!("");
                }
                other => return Err(ApiError::status(400, format!("Unknown status {other}"))),
            }
        }
        merge(doc, body);
        doc["updatedAt"] = json!(now());
        Ok(doc.clone())
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn merge(doc: &mut Value, body: &Value) {
    if let (Value::Object(target), Value::Object(fields)) = (doc, body) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// [`ApplicationsApi`] backed by a [`FakeServer`], acting as one user
#[derive(Debug, Clone)]
pub struct FakeClient {
    server: FakeServer,
    actor: Value,
}

impl FakeClient {
    pub fn server(&self) -> &FakeServer {
        &self.server
    }

    fn call(&self, op: Op, id: Option<&str>, body: Option<Value>) -> Call {
        Call {
            op,
            actor: UserId::new(self.actor["_id"].as_str().unwrap_or_default()),
            id: id.map(str::to_string),
            body,
        }
    }
}

#[async_trait]
impl ApplicationsApi for FakeClient {
    async fn fetch_applications(&self) -> Result<ListResponse, ApiError> {
        let (hold, failure) = self.server.begin(self.call(Op::FetchAll, None, None));
        let snapshot = failure.map_or_else(|| Ok(self.server.list()), Err);
        if let Some(hold) = hold {
            hold.wait().await;
        }
        snapshot
    }

    async fn fetch_application(&self, id: &ServerId) -> Result<Value, ApiError> {
        let (hold, failure) = self
            .server
            .begin(self.call(Op::FetchOne, Some(id.as_str()), None));
        let snapshot = failure.map_or_else(|| self.server.get(id.as_str()), Err);
        if let Some(hold) = hold {
            hold.wait().await;
        }
        snapshot
    }

    async fn create_application(&self, patch: &FieldPatch) -> Result<Value, ApiError> {
        let body = patch.to_json();
        let (hold, failure) = self
            .server
            .begin(self.call(Op::Create, None, Some(body.clone())));
        if let Some(hold) = hold {
            hold.wait().await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(self.server.create(&body)),
        }
    }

    async fn update_application(
        &self,
        id: &ServerId,
        patch: &FieldPatch,
    ) -> Result<Value, ApiError> {
        let body = patch.to_json();
        let (hold, failure) =
            self.server
                .begin(self.call(Op::Update, Some(id.as_str()), Some(body.clone())));
        if let Some(hold) = hold {
            hold.wait().await;
        }
        match failure {
            Some(error) => Err(error),
            None => self.server.update(id.as_str(), &body, &self.actor),
        }
    }
}

// ---- Fixtures ----

/// Pending application document
pub fn application(id: &str) -> Value {
    json!({
        "_id": id,
        "company": format!("Company {id}"),
        "roleTitle": "Backend Engineer",
        "jobUrl": format!("https://jobs.example.com/{id}"),
        "bidderNote": "",
        "profileId": {"_id": "p1", "alias": "PJ"},
        "resumeId": {"_id": "r1", "title": "Backend"},
        "bidderId": {"_id": "bidder", "name": "Bea"},
        "checkStatus": "pending",
        "checkResult": "pending",
        "checkNote": "",
        "createdAt": "2026-01-05T09:00:00Z",
    })
}

/// Application document in review, held by `checker`
pub fn in_review(id: &str, checker: &str) -> Value {
    let mut doc = application(id);
    doc["checkStatus"] = json!("in_review");
    doc["checkedBy"] = json!({"_id": checker});
    doc
}

/// Catalogue matching the fixture documents
pub fn catalogue() -> Value {
    json!({
        "profiles": [{"_id": "p1", "alias": "PJ"}, {"_id": "p2", "alias": "QK"}],
        "bidders": [{"_id": "bidder", "name": "Bea"}, {"_id": "u1", "name": "Uma"}],
        "checkStatuses": ["pending", "in_review", "reviewed"],
        "resumesByProfile": {
            "p1": [{"_id": "r1", "title": "Backend"}],
            "p2": [{"_id": "r2", "title": "Frontend"}]
        }
    })
}

fn with_applications(id: &str, permissions: Value) -> Identity {
    let mut claims = Map::new();
    claims.insert("applications".to_string(), permissions);
    Identity::new(id)
        .with_name(format!("User {id}"))
        .with_permissions(Value::Object(claims))
}

/// May check every application
pub fn checker(id: &str) -> Identity {
    with_applications(id, json!({"checkAll": true}))
}

/// May manage every application
pub fn manager(id: &str) -> Identity {
    with_applications(id, json!("all"))
}

/// May manage and check every application
pub fn lead(id: &str) -> Identity {
    with_applications(id, json!({"manageAll": true, "checkAll": true}))
}

/// May manage the listed profiles only
pub fn scoped_manager(id: &str, profiles: &[&str]) -> Identity {
    with_applications(id, json!({"manageApplications": profiles}))
}

/// No applications access
pub fn outsider(id: &str) -> Identity {
    with_applications(id, Value::Null)
}

/// Administrator who may also check
pub fn admin(id: &str) -> Identity {
    with_applications(id, json!({"checkAll": true})).with_role("admin")
}
