//! API integration tests.
//!
//! Drive the router with `tower::ServiceExt::oneshot` over a migrated
//! in-memory `SQLite` database.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use permit_hub_api::{AppState, router};
use permit_hub_common::{AppResult, PermitConfig};
use permit_hub_core::{
    CreateFieldInput, CreatePermitTypeInput, CreateRoleInput, CreateStepInput, DocumentRenderer,
    RenderContext, RenderedDocument,
};
use permit_hub_db::entities::{approval_step::ApprovalMode, field_definition::FieldKind};
use permit_hub_db::test_utils::in_memory;
use serde_json::{Value, json};
use tower::ServiceExt;

struct MemoryRenderer;

#[async_trait::async_trait]
impl DocumentRenderer for MemoryRenderer {
    async fn render(&self, context: &RenderContext) -> AppResult<RenderedDocument> {
        Ok(RenderedDocument {
            filename: format!("{}.json", context.request.code),
            url: format!("memory://{}", context.register_number),
            checksum: None,
            storage_key: None,
        })
    }
}

/// Router over a fresh database holding a two-step `domicile` type.
async fn create_test_app() -> Router {
    let db = Arc::new(in_memory().await.unwrap());
    let state = AppState::new(db, Arc::new(MemoryRenderer), &PermitConfig::default());

    for id in ["clerk", "head"] {
        state
            .catalog
            .create_role(CreateRoleInput {
                id: Some(id.to_string()),
                name: format!("{id} officer"),
            })
            .await
            .unwrap();
    }

    let permit_type = state
        .catalog
        .create_permit_type(CreatePermitTypeInput {
            slug: "domicile".to_string(),
            name: "Domicile letter".to_string(),
            description: None,
            subdistrict_id: None,
            company_id: None,
            template_id: None,
            template_config: None,
        })
        .await
        .unwrap();

    state
        .catalog
        .add_field(
            &permit_type.id,
            CreateFieldInput {
                key: "purpose".to_string(),
                label: "Purpose".to_string(),
                kind: FieldKind::Text,
                required: true,
                display_order: None,
                choices: None,
            },
        )
        .await
        .unwrap();

    for role in ["clerk", "head"] {
        state
            .catalog
            .add_step(
                &permit_type.id,
                CreateStepInput {
                    step_order: None,
                    description: None,
                    approval_mode: ApprovalMode::Single,
                    role_ids: vec![role.to_string()],
                },
            )
            .await
            .unwrap();
    }

    router().with_state(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn decision(id: &str, role: Option<&str>, approved: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(format!("/requests/{id}/decisions"))
        .method("POST")
        .header("Content-Type", "application/json")
        .header("x-user-id", "officer-1");
    if let Some(role) = role {
        builder = builder.header("x-role-id", role);
    }
    builder
        .body(Body::from(json!({ "approved": approved, "note": null }).to_string()))
        .unwrap()
}

fn submission(purpose: Option<&str>) -> Value {
    let payload = purpose.map_or_else(|| json!({}), |p| json!({ "purpose": p }));
    json!({
        "citizen": {
            "nik": "3201010101010001",
            "name": "Ana",
            "email": "ana@example.com"
        },
        "payload": payload
    })
}

async fn submit(app: &Router) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/permit-types/domicile/requests",
            &submission(Some("open shop")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_get_permit_type() {
    let app = create_test_app().await;

    let (status, body) = send(&app, get("/permit-types/domicile")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "domicile");
    assert_eq!(body["data"]["fields"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["steps"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["steps"][0]["roles"][0]["id"], "clerk");
}

#[tokio::test]
async fn test_unknown_permit_type_is_not_found() {
    let app = create_test_app().await;

    let (status, body) = send(&app, get("/permit-types/unknown?subdistrict=kec-01")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_submit_and_approve_through_both_steps() {
    let app = create_test_app().await;
    let id = submit(&app).await;

    let (status, body) = send(&app, decision(&id, Some("clerk"), true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["advanced"], true);
    assert_eq!(body["data"]["status"], "in_progress");
    assert_eq!(body["data"]["current_step"], 1);

    let (status, body) = send(&app, decision(&id, Some("head"), true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert!(body["data"]["register_number"].is_string());

    let (status, body) = send(&app, get(&format!("/requests/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["citizen"]["nik"], "3201010101010001");
    assert_eq!(body["data"]["approval_log"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["final_documents"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, get(&format!("/requests/{id}/decisions"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, get(&format!("/requests/{id}/documents"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, decision(&id, Some("head"), true)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "STATE_CONFLICT");
}

#[tokio::test]
async fn test_decision_requires_caller_and_role() {
    let app = create_test_app().await;
    let id = submit(&app).await;

    let anonymous = json_request(
        "POST",
        &format!("/requests/{id}/decisions"),
        &json!({ "approved": true }),
    );
    let (status, body) = send(&app, anonymous).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, decision(&id, None, true)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, decision(&id, Some("head"), true)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(&app, get(&format!("/requests/{id}"))).await;
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(body["data"]["approval_log"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_rejection_is_terminal() {
    let app = create_test_app().await;
    let id = submit(&app).await;

    let (status, body) = send(&app, decision(&id, Some("clerk"), false)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["advanced"], false);

    let (status, _) = send(&app, decision(&id, Some("clerk"), true)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_missing_required_field_names_the_field() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app,
        json_request("POST", "/permit-types/domicile/requests", &submission(None)),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "purpose");

    let (_, body) = send(&app, get("/requests")).await;
    assert_eq!(body["data"]["total_items"], 0);
}

#[tokio::test]
async fn test_list_requests_filters_and_pages() {
    let app = create_test_app().await;
    let first = submit(&app).await;
    submit(&app).await;
    send(&app, decision(&first, Some("clerk"), true)).await;

    let (status, body) = send(&app, get("/requests?per_page=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_items"], 2);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, get("/requests?status=in_progress")).await;
    assert_eq!(body["data"]["total_items"], 1);
    assert_eq!(body["data"]["items"][0]["id"], first.as_str());

    let (_, body) = send(&app, get("/requests?company_id=acme")).await;
    assert_eq!(body["data"]["total_items"], 0);
}

#[tokio::test]
async fn test_update_and_delete_request() {
    let app = create_test_app().await;
    let id = submit(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/requests/{id}"),
            &json!({ "company_id": "acme", "payload": { "purpose": "warehouse" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["company_id"], "acme");

    let (_, body) = send(&app, get(&format!("/requests/{id}"))).await;
    assert_eq!(body["data"]["dynamic_data"]["data"]["purpose"], "warehouse");

    let (status, body) = send(
        &app,
        json_request("PATCH", &format!("/requests/{id}"), &json!({ "payload": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["field"], "purpose");

    let delete = Request::builder()
        .uri(format!("/requests/{id}"))
        .method("DELETE")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&format!("/requests/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
