//! Test fixtures shared by the unit tests and the integration tests: a
//! scripted activation channel, an in-process coordinator and small fleets.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tgo::activation::{Action, ActivationChannel};
use tgo::environment::Fleet;
use tgo_common::{App, EnvSnapshot, Instance, ReplyCode, StatusMsg, StatusReply};

/// Activation channel answering from per-app scripts. The last scripted reply
/// for an action repeats forever.
#[derive(Default)]
pub struct ScriptedActivator {
    replies: Mutex<HashMap<(String, Action), VecDeque<String>>>,
    calls: Mutex<Vec<(String, Action)>>,
}

impl ScriptedActivator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, app: &str, action: Action, replies: &[&str]) -> Self {
        self.replies.lock().unwrap().insert(
            (app.to_string(), action),
            replies.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<(String, Action)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, app: &str, action: Action) -> usize {
        self.calls()
            .iter()
            .filter(|(a, act)| a == app && *act == action)
            .count()
    }
}

#[async_trait]
impl ActivationChannel for ScriptedActivator {
    async fn activate(&self, fleet: &Fleet, index: usize, action: Action) -> String {
        let name = fleet.app(index).name.clone();
        self.calls.lock().unwrap().push((name.clone(), action));
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(&(name, action)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => "error - unscripted".to_string(),
        }
    }
}

/// What the stub coordinator answers and what it has seen.
pub struct Coordinator {
    pub http: StatusCode,
    pub code: ReplyCode,
    /// Sent verbatim instead of a reply built from `code`
    pub raw_reply: Option<String>,
    pub received: Vec<StatusMsg>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self {
            http: StatusCode::OK,
            code: ReplyCode::Ok,
            raw_reply: None,
            received: Vec::new(),
        }
    }
}

pub type SharedCoordinator = Arc<Mutex<Coordinator>>;

async fn status_handler(
    State(coord): State<SharedCoordinator>,
    Json(msg): Json<StatusMsg>,
) -> Response {
    let mut coord = coord.lock().unwrap();
    coord.received.push(msg);
    match &coord.raw_reply {
        Some(raw) => (coord.http, raw.clone()).into_response(),
        None => (coord.http, Json(StatusReply::new("stub", coord.code))).into_response(),
    }
}

/// Serve a coordinator on an ephemeral port. Returns its base URL.
pub async fn start_coordinator(coord: Coordinator) -> (String, SharedCoordinator) {
    let shared = Arc::new(Mutex::new(coord));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_coordinator(listener, shared.clone()));
    (format!("http://{}/", addr), shared)
}

/// Serve `coord` on an already bound listener until the runtime shuts down.
pub async fn serve_coordinator(listener: tokio::net::TcpListener, coord: SharedCoordinator) {
    let app = Router::new()
        .route("/status/", post(status_handler))
        .with_state(coord);
    axum::serve(listener, app).await.unwrap();
}

/// Number of status pushes the coordinator has seen.
pub fn request_count(coord: &SharedCoordinator) -> usize {
    coord.lock().unwrap().received.len()
}

/// `(State, UID)` of every status the coordinator received, in order.
pub fn pushes(coord: &SharedCoordinator) -> Vec<(String, String)> {
    coord
        .lock()
        .unwrap()
        .received
        .iter()
        .map(|m| (m.state.clone(), m.uid.clone()))
        .collect()
}

pub fn app(name: &str) -> App {
    App {
        uid: name.to_string(),
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn test_app(name: &str) -> App {
    App {
        is_test: true,
        ..app(name)
    }
}

/// A single-instance fleet named "main" whose agent is the app named "tgo".
pub fn fleet(apps: Vec<App>) -> Fleet {
    let env = EnvSnapshot {
        instances: vec![Instance {
            inst_name: "main".to_string(),
            apps,
            ..Default::default()
        }],
        ..Default::default()
    };
    Fleet::identify(env, "tgo").unwrap()
}
