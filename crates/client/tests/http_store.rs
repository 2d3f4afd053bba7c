use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use collateral_client::HttpRecordStore;
use collateral_core::{
    CancelToken, CompanyProfileDraft, Draft, InterfaceError, PersistenceError, QuotationDraft,
    RecordId, RecordStatus, RecordStore, ResourceKind, RetryPolicy, Session, TripLine,
    TwoPhasePersister, ViewState,
};

#[derive(Default)]
struct Backend {
    next_id: u64,
    rows: HashMap<(String, String), Value>,
    patch_bodies: Vec<Value>,
    fail_create: bool,
    fail_patch: bool,
    omit_id: bool,
}

type Shared = Arc<Mutex<Backend>>;

async fn create_row(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut backend = state.lock().expect("backend lock");
    if backend.fail_create {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "down" })));
    }
    if backend.omit_id {
        return (StatusCode::CREATED, Json(json!({ "ok": true })));
    }
    backend.next_id += 1;
    let id = format!("rec-{}", backend.next_id);
    body["id"] = json!(id);
    backend.rows.insert((collection, id), body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn patch_row(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut backend = state.lock().expect("backend lock");
    if backend.fail_patch {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "busy" })));
    }
    backend.patch_bodies.push(body.clone());
    let Some(row) = backend.rows.get_mut(&(collection, id)) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "missing" })));
    };
    if let (Some(row), Some(fields)) = (row.as_object_mut(), body.as_object()) {
        for (key, value) in fields {
            row.insert(key.clone(), value.clone());
        }
    }
    (StatusCode::OK, Json(row.clone()))
}

async fn spawn_backend(state: Shared) -> String {
    let app = Router::new()
        .route("/tables/{collection}", post(create_row))
        .route("/tables/{collection}/{id}", patch(patch_row))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
    let address = listener.local_addr().expect("backend address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{address}")
}

fn quotation_draft() -> Draft {
    Draft::Quotation(QuotationDraft {
        target_company: "Acme Travel".to_owned(),
        trips: vec![
            TripLine {
                name: "City Tour".to_owned(),
                price: Decimal::from(100),
                description: "Professional travel package for City Tour".to_owned(),
            },
            TripLine {
                name: "Museum".to_owned(),
                price: Decimal::from(50),
                description: "Guided".to_owned(),
            },
        ],
        subtotal: Decimal::from(150),
        final_total: Decimal::from(165),
        created_at: Utc::now(),
        status: RecordStatus::Active,
    })
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(5),
        backoff_multiplier: 2,
    }
}

#[tokio::test]
async fn create_posts_draft_as_json_numbers() {
    let state = Shared::default();
    let base_url = spawn_backend(state.clone()).await;
    let store = HttpRecordStore::new(format!("{base_url}/"));

    let id = store.create(&quotation_draft()).await.expect("create succeeds");
    assert_eq!(id, RecordId("rec-1".to_owned()));

    let backend = state.lock().expect("backend lock");
    let row = &backend.rows[&("quotations".to_owned(), "rec-1".to_owned())];
    assert_eq!(row["target_company"], "Acme Travel");
    assert_eq!(row["status"], "active");
    assert_eq!(row["subtotal"].as_f64(), Some(150.0));
    assert_eq!(row["final_total"].as_f64(), Some(165.0));
    assert_eq!(row["trips"][1]["price"].as_f64(), Some(50.0));
}

#[tokio::test]
async fn attach_url_patches_only_the_url_field() {
    let state = Shared::default();
    let store = HttpRecordStore::new(spawn_backend(state.clone()).await);
    let draft = Draft::CompanyProfile(CompanyProfileDraft {
        target_company: "Acme".to_owned(),
        created_at: Utc::now(),
        status: RecordStatus::Active,
    });

    let id = store.create(&draft).await.expect("create succeeds");
    store
        .attach_url(ResourceKind::CompanyProfile, &id, "company-profile.html?company=Acme&id=rec-1")
        .await
        .expect("patch succeeds");

    let backend = state.lock().expect("backend lock");
    assert_eq!(
        backend.patch_bodies,
        vec![json!({ "profile_url": "company-profile.html?company=Acme&id=rec-1" })]
    );
    let row = &backend.rows[&("company_profiles".to_owned(), "rec-1".to_owned())];
    assert_eq!(row["target_company"], "Acme");
    assert_eq!(row["profile_url"], "company-profile.html?company=Acme&id=rec-1");
}

#[tokio::test]
async fn attach_url_escapes_reserved_characters_in_record_id() {
    let state = Shared::default();
    let id = RecordId("rec/7?x#y".to_owned());
    state
        .lock()
        .expect("backend lock")
        .rows
        .insert(("quotations".to_owned(), id.0.clone()), json!({ "target_company": "Acme" }));
    let store = HttpRecordStore::new(spawn_backend(state.clone()).await);

    store
        .attach_url(ResourceKind::Quotation, &id, "quotation.html?company=Acme&quote=rec%2F7")
        .await
        .expect("patch reaches the single record");

    let backend = state.lock().expect("backend lock");
    let row = &backend.rows[&("quotations".to_owned(), id.0.clone())];
    assert_eq!(row["quotation_url"], "quotation.html?company=Acme&quote=rec%2F7");
}

#[tokio::test]
async fn unusable_base_url_fails_patch_before_sending() {
    let store = HttpRecordStore::new("not a url");

    let error = store
        .attach_url(ResourceKind::Quotation, &RecordId("1".to_owned()), "quotation.html")
        .await
        .expect_err("no request can be built");
    assert!(matches!(error, PersistenceError::Transport { operation: "patch", .. }));
}

#[tokio::test]
async fn rejected_create_maps_to_status_error() {
    let state = Shared::default();
    state.lock().expect("backend lock").fail_create = true;
    let store = HttpRecordStore::new(spawn_backend(state).await);

    let error = store.create(&quotation_draft()).await.expect_err("create fails");
    assert_eq!(error, PersistenceError::Status { operation: "create", status: 500 });
}

#[tokio::test]
async fn create_without_id_is_malformed() {
    let state = Shared::default();
    state.lock().expect("backend lock").omit_id = true;
    let store = HttpRecordStore::new(spawn_backend(state).await);

    let error = store.create(&quotation_draft()).await.expect_err("create fails");
    assert!(matches!(error, PersistenceError::MalformedResponse(_)));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);

    let store = HttpRecordStore::new(format!("http://{address}"));
    let error = store.create(&quotation_draft()).await.expect_err("create fails");
    assert!(matches!(error, PersistenceError::Transport { operation: "create", .. }));
}

#[tokio::test]
async fn session_submits_quotation_through_http() {
    let state = Shared::default();
    let base_url = spawn_backend(state.clone()).await;
    let persister = TwoPhasePersister::new(
        HttpRecordStore::new(&base_url),
        fast_retry(),
        Duration::from_secs(5),
    );
    let mut session = Session::new(persister, "https://share.example");

    session.select_output_type(ResourceKind::Quotation);
    session.set_target_company("Acme Travel");
    let first = session.trips().entries()[0].id;
    session.trips_mut().set_name(first, "City Tour").expect("row exists");
    session.trips_mut().set_price_input(first, "150").expect("row exists");

    let view = session.submit(&CancelToken::never()).await.expect("submission succeeds");
    assert_eq!(view.relative_url, "quotation.html?company=Acme%20Travel&quote=rec-1");
    assert_eq!(
        view.absolute_url,
        "https://share.example/quotation.html?company=Acme%20Travel&quote=rec-1"
    );
    assert_eq!(session.view(), ViewState::Result);

    let backend = state.lock().expect("backend lock");
    let row = &backend.rows[&("quotations".to_owned(), "rec-1".to_owned())];
    assert_eq!(row["final_total"].as_f64(), Some(165.0));
    assert_eq!(row["quotation_url"], "quotation.html?company=Acme%20Travel&quote=rec-1");
}

#[tokio::test]
async fn failed_patch_leaves_partial_record_that_can_be_resumed() {
    let state = Shared::default();
    state.lock().expect("backend lock").fail_patch = true;
    let base_url = spawn_backend(state.clone()).await;
    let persister = TwoPhasePersister::new(
        HttpRecordStore::new(&base_url),
        fast_retry(),
        Duration::from_secs(5),
    );
    let mut session = Session::new(persister, base_url.clone());
    session.select_output_type(ResourceKind::CompanyProfile);
    session.set_target_company("Acme");

    let error = session.submit(&CancelToken::never()).await.expect_err("patch never lands");
    assert!(matches!(error, InterfaceError::Recoverable { .. }));
    assert_eq!(session.view(), ViewState::Form);
    let partial = session.partial().expect("partial record kept").clone();
    assert_eq!(partial.id, RecordId("rec-1".to_owned()));

    state.lock().expect("backend lock").fail_patch = false;
    let view = session.resume_partial(&CancelToken::never()).await.expect("resume succeeds");
    assert_eq!(view.absolute_url, format!("{base_url}/company-profile.html?company=Acme&id=rec-1"));
    assert!(session.partial().is_none());
    assert_eq!(state.lock().expect("backend lock").rows.len(), 1);
}
