#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use constcat::concat;
use helpdesk_dispatch::{
    api, backend, config, realtime::memory, view::ViewState, Desk, Timeouts,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::{net, task, time};

const API: &str = "/api";
const TICKETS: &str = concat!(API, "/tickets");
const PRIORITY: &str = concat!(TICKETS, "/:id/priority");
const ESC_LEVEL: &str = concat!(TICKETS, "/:id/escLevel");

const WAIT: Duration = Duration::from_secs(5);

/// Mock of the ticket backend, recording every update call.
#[derive(Default)]
pub struct Backend {
    pub tickets: Mutex<Vec<Value>>,
    pub calls: Mutex<Vec<(String, Value)>>,
    pub failing: Mutex<Vec<&'static str>>,
    pub delay: Mutex<Duration>,
}

impl Backend {
    pub fn fail(&self, endpoint: &'static str) {
        self.failing.lock().push(endpoint);
    }

    pub fn recover(&self) {
        self.failing.lock().clear();
    }

    pub fn set_tickets(&self, tickets: Vec<Value>) {
        *self.tickets.lock() = tickets;
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    fn is_failing(&self, endpoint: &str) -> bool {
        self.failing.lock().iter().any(|e| *e == endpoint)
    }
}

pub fn ticket(id: u64) -> Value {
    json!({
        "id": id,
        "os": "Windows 10",
        "issue": format!("Issue {id}"),
        "status": "Pending",
        "priority": null,
        "escLevel": "",
        "comments": [{"comment": format!("Comment on {id}")}],
    })
}

pub fn technician(id: &str, name: &str) -> api::Account {
    api::Account {
        id: id.into(),
        name: name.into(),
        role: api::technician::Role::Technician,
    }
}

pub fn staff(id: &str, name: &str) -> api::Account {
    api::Account {
        id: id.into(),
        name: name.into(),
        role: api::technician::Role::Other("helpdesk".into()),
    }
}

/// Serves the mock backend on an ephemeral port and returns its API URL.
pub async fn spawn_backend(tickets: Vec<Value>) -> (String, Arc<Backend>) {
    let state = Arc::new(Backend::default());
    state.set_tickets(tickets);

    let app = Router::new()
        .route(TICKETS, get(list_tickets))
        .route(PRIORITY, put(update_priority))
        .route(ESC_LEVEL, put(update_esc_level))
        .with_state(state.clone());
    let url = serve(app).await;
    (format!("{url}{API}"), state)
}

/// Serves `app` on an ephemeral port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local address");
    task::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });
    format!("http://{addr}")
}

async fn list_tickets(
    State(state): State<Arc<Backend>>,
) -> Result<Json<Vec<Value>>, StatusCode> {
    let delay = *state.delay.lock();
    time::sleep(delay).await;
    if state.is_failing("list") {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(state.tickets.lock().clone()))
}

async fn update_priority(
    State(state): State<Arc<Backend>>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> StatusCode {
    record(&state, "priority", format!("{TICKETS}/{id}/priority"), body)
}

async fn update_esc_level(
    State(state): State<Arc<Backend>>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> StatusCode {
    record(&state, "escLevel", format!("{TICKETS}/{id}/escLevel"), body)
}

fn record(
    state: &Backend,
    endpoint: &str,
    path: String,
    body: Value,
) -> StatusCode {
    state.calls.lock().push((path, body));
    if state.is_failing(endpoint) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

pub fn backend_config(url: &str) -> config::Backend {
    config::Backend {
        url: url.to_owned(),
        timeout: Duration::from_secs(2),
    }
}

pub fn timeouts() -> Timeouts {
    Timeouts {
        backend: Duration::from_secs(2),
        realtime: Duration::from_secs(2),
    }
}

/// Desk wired to the mock backend and an in-process real-time store.
pub struct Harness {
    pub backend: Arc<Backend>,
    pub store: Arc<memory::Store>,
    pub desk: Desk,
}

impl Harness {
    pub async fn start(tickets: Vec<Value>) -> Self {
        Self::start_with(tickets, |_, _| {}).await
    }

    /// Starts after `prepare` has seeded the stores.
    pub async fn start_with(
        tickets: Vec<Value>,
        prepare: impl FnOnce(&Backend, &memory::Store),
    ) -> Self {
        let (url, backend) = spawn_backend(tickets).await;
        let store = Arc::new(memory::Store::new());
        prepare(&*backend, &*store);

        let client = backend::Client::new(backend_config(&url))
            .expect("failed to build client");
        let desk =
            Desk::start(Arc::new(client), store.clone(), timeouts()).await;
        Self {
            backend,
            store,
            desk,
        }
    }

    /// Waits until the view satisfies `pred`.
    pub async fn settle(
        &self,
        pred: impl FnMut(&ViewState) -> bool,
    ) -> ViewState {
        time::timeout(WAIT, self.desk.view().wait_for(pred))
            .await
            .expect("view did not settle")
    }

    pub fn state(&self) -> ViewState {
        self.desk.view().state()
    }
}

pub fn pending_ids(state: &ViewState) -> Vec<u64> {
    state.pending().map(|t| t.id.get()).collect()
}

pub fn assign(store: &memory::Store, ticket: u64, technician: &str) {
    store.put_assignment(api::AssignmentRecord {
        ticket_id: ticket.into(),
        technician_id: technician.into(),
    });
}

/// Polls `cond` until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let poll = async {
        while !cond() {
            time::sleep(Duration::from_millis(5)).await;
        }
    };
    time::timeout(WAIT, poll).await.expect("condition never held");
}

pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    time::timeout(WAIT, fut).await.expect("timed out")
}
