pub mod common;

use std::sync::Arc;

use helpdesk_dispatch::{backend, http, realtime::memory, view, Desk};
use reqwest::StatusCode;
use serde_json::json;

use self::common::{serve, spawn_backend, technician, ticket};

async fn start() -> (String, Arc<memory::Store>) {
    let (url, _) = spawn_backend(vec![ticket(1), ticket(2)]).await;
    let store = Arc::new(memory::Store::new());
    store.put_account(technician("7", "Tina"));
    let client = backend::Client::new(common::backend_config(&url)).unwrap();
    let desk =
        Desk::start(Arc::new(client), store.clone(), common::timeouts()).await;
    let ready = desk.view().wait_for(|s| {
        s.pending().count() == 2 && !s.technicians().is_empty()
    });
    common::within(ready).await;

    (serve(http::router(Arc::new(desk))).await, store)
}

async fn intent(
    base: &str,
    body: serde_json::Value,
) -> Result<view::Snapshot, StatusCode> {
    let res = reqwest::Client::new()
        .post(format!("{base}/intent"))
        .json(&body)
        .send()
        .await
        .expect("failed to send a request");
    Ok(res
        .error_for_status()
        .map_err(|e| e.status().expect("status error"))?
        .json::<view::Snapshot>()
        .await
        .expect("failed to get a response"))
}

#[tokio::test]
async fn serves_pending_view() {
    let (base, _) = start().await;

    let snapshot = reqwest::get(format!("{base}/view"))
        .await
        .expect("failed to send a request")
        .error_for_status()
        .expect("wrong status code")
        .json::<view::Snapshot>()
        .await
        .expect("failed to get a response");

    let ids = snapshot
        .pending_tickets
        .iter()
        .map(|t| t.id.get())
        .collect::<Vec<_>>();
    assert_eq!(ids, [1, 2]);
    assert_eq!(snapshot.technicians[0].name, "Tina");
    assert!(snapshot.selection.is_none());
    assert!(snapshot.failure.is_none());
}

#[tokio::test]
async fn assigns_through_intents() {
    let (base, store) = start().await;

    let snapshot = intent(&base, json!({"op": "selectTicket", "data": {"id": 2}}))
        .await
        .unwrap();
    assert_eq!(snapshot.selection.map(|s| s.ticket), Some(2.into()));

    intent(
        &base,
        json!({"op": "setDraftPriority", "data": {"priority": "Moderate"}}),
    )
    .await
    .unwrap();
    intent(&base, json!({"op": "setDraftEscalation", "data": {"escLevel": "3"}}))
        .await
        .unwrap();
    intent(&base, json!({"op": "setDraftTechnician", "data": {"id": "7"}}))
        .await
        .unwrap();

    let snapshot = intent(&base, json!({"op": "confirmAssignment"}))
        .await
        .unwrap();
    assert!(snapshot.selection.is_none());
    assert_eq!(
        snapshot.notice.map(|n| n.outcome),
        Some(view::Outcome::Assigned),
    );
    assert!(store.assignment(2.into()).is_some());
}

#[tokio::test]
async fn rejects_invalid_selection() {
    let (base, _) = start().await;

    let status = intent(&base, json!({"op": "selectTicket", "data": {"id": 9}}))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);

    let status = intent(&base, json!({"op": "deselect"})).await.map(drop);
    assert_eq!(status, Ok(()));
}
