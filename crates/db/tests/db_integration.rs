//! Repository tests against the real schema.
//!
//! Most tests run on a migrated in-memory `SQLite` database. The `PostgreSQL`
//! ones are ignored by default; run them with
//! `cargo test -p permit-hub-db --features test-utils --test db_integration -- --ignored`
//! after pointing `TEST_DB_HOST`, `TEST_DB_PORT`, `TEST_DB_USER`,
//! `TEST_DB_PASSWORD` and `TEST_DB_NAME` at a server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use permit_hub_common::AppError;
use permit_hub_db::entities::{citizen, permit_request, permit_request::RequestStatus, permit_type};
use permit_hub_db::repositories::{
    CitizenRepository, PermitRequestRepository, PermitTypeRepository,
};
use permit_hub_db::test_utils::{TestDatabase, in_memory, reset};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set,
    TransactionTrait,
};
use serde_json::json;

async fn insert_type(
    db: &DatabaseConnection,
    id: &str,
    slug: &str,
    subdistrict_id: Option<&str>,
) -> permit_type::Model {
    permit_type::ActiveModel {
        id: Set(id.to_string()),
        slug: Set(slug.to_string()),
        name: Set(format!("{slug} permit")),
        description: Set(None),
        subdistrict_id: Set(subdistrict_id.map(ToString::to_string)),
        company_id: Set(None),
        template_id: Set(None),
        template_config: Set(None),
        register_seq: Set(0),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap()
}

async fn insert_request<C: ConnectionTrait>(
    conn: &C,
    id: &str,
    permit_type_id: &str,
    register_number: Option<&str>,
) -> Result<permit_request::Model, sea_orm::DbErr> {
    if citizen::Entity::find_by_id("c1").one(conn).await?.is_none() {
        citizen::ActiveModel {
            id: Set("c1".to_string()),
            nik: Set("3201010101010001".to_string()),
            name: Set("Ana".to_string()),
            email: Set(None),
            phone: Set(None),
            address: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(conn)
        .await?;
    }

    permit_request::ActiveModel {
        id: Set(id.to_string()),
        code: Set(format!("PRM-20250601-{}", id.to_uppercase())),
        permit_type_id: Set(permit_type_id.to_string()),
        citizen_id: Set("c1".to_string()),
        company_id: Set(None),
        subdistrict_id: Set(None),
        submitted_at: Set(Utc::now().into()),
        current_step: Set(0),
        current_step_roles: Set(json!(["clerk"])),
        status: Set(RequestStatus::Submitted),
        approved_at: Set(None),
        register_number: Set(register_number.map(ToString::to_string)),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
    .insert(conn)
    .await
}

#[tokio::test]
async fn test_register_seq_is_consumed_only_on_commit() {
    let db = Arc::new(in_memory().await.unwrap());
    insert_type(&db, "pt1", "domicile", None).await;
    let repo = PermitTypeRepository::new(db.clone());

    let txn = db.begin().await.unwrap();
    assert_eq!(repo.next_register_seq_in(&txn, "pt1").await.unwrap(), 1);
    txn.rollback().await.unwrap();

    let txn = db.begin().await.unwrap();
    assert_eq!(repo.next_register_seq_in(&txn, "pt1").await.unwrap(), 1);
    assert_eq!(repo.next_register_seq_in(&txn, "pt1").await.unwrap(), 2);
    txn.commit().await.unwrap();

    assert_eq!(repo.get_by_id("pt1").await.unwrap().register_seq, 2);
}

#[tokio::test]
async fn test_register_seq_of_unknown_type() {
    let db = Arc::new(in_memory().await.unwrap());
    let repo = PermitTypeRepository::new(db.clone());

    let result = repo.next_register_seq_in(db.as_ref(), "missing").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_scoped_slug_shadows_global() {
    let db = Arc::new(in_memory().await.unwrap());
    insert_type(&db, "global", "domicile", None).await;
    insert_type(&db, "scoped", "domicile", Some("kec-01")).await;
    let repo = PermitTypeRepository::new(db);

    let found = repo.find_by_slug("domicile", Some("kec-01")).await.unwrap();
    assert_eq!(found.unwrap().id, "scoped");

    let found = repo.find_by_slug("domicile", Some("kec-02")).await.unwrap();
    assert_eq!(found.unwrap().id, "global");

    let found = repo.find_by_slug("domicile", None).await.unwrap();
    assert_eq!(found.unwrap().id, "global");

    assert!(repo.slug_taken("domicile", Some("kec-01"), None).await.unwrap());
    assert!(!repo.slug_taken("domicile", Some("kec-01"), Some("scoped")).await.unwrap());
}

#[tokio::test]
async fn test_register_number_unique_per_type() {
    let db = in_memory().await.unwrap();
    insert_type(&db, "pt1", "domicile", None).await;
    insert_type(&db, "pt2", "business", None).await;

    insert_request(&db, "r1", "pt1", Some("DOMICILE/000001/2025")).await.unwrap();
    insert_request(&db, "r2", "pt2", Some("DOMICILE/000001/2025")).await.unwrap();
    insert_request(&db, "r3", "pt1", None).await.unwrap();
    insert_request(&db, "r4", "pt1", None).await.unwrap();

    let duplicate = insert_request(&db, "r5", "pt1", Some("DOMICILE/000001/2025")).await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_lock_by_id_in_transaction() {
    let db = Arc::new(in_memory().await.unwrap());
    insert_type(&db, "pt1", "domicile", None).await;
    insert_request(db.as_ref(), "r1", "pt1", None).await.unwrap();
    let repo = PermitRequestRepository::new(db.clone());

    let txn = db.begin().await.unwrap();
    let locked = repo.lock_by_id_in(&txn, "r1").await.unwrap();
    assert_eq!(locked.current_role_ids(), vec!["clerk"]);

    let missing = repo.lock_by_id_in(&txn, "r2").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    txn.commit().await.unwrap();
}

async fn move_request(
    db: &DatabaseConnection,
    request: permit_request::Model,
    step: i32,
    status: RequestStatus,
) -> permit_request::Model {
    let mut active: permit_request::ActiveModel = request.into();
    active.current_step = Set(step);
    active.status = Set(status);
    active.update(db).await.unwrap()
}

#[tokio::test]
async fn test_step_roles_written_only_at_expected_step() {
    let db = Arc::new(in_memory().await.unwrap());
    insert_type(&db, "pt1", "domicile", None).await;
    let request = insert_request(db.as_ref(), "r1", "pt1", None).await.unwrap();
    move_request(&db, request, 1, RequestStatus::InProgress).await;
    let repo = PermitRequestRepository::new(db.clone());

    let stale = repo
        .set_step_roles_if_at("r1", 0, &["deputy".to_string()], Utc::now())
        .await
        .unwrap();
    assert!(!stale);
    let stored = repo.get_by_id("r1").await.unwrap();
    assert_eq!(stored.current_role_ids(), vec!["clerk"]);
    assert!(stored.updated_at.is_none());

    let current = repo
        .set_step_roles_if_at("r1", 1, &["head".to_string()], Utc::now())
        .await
        .unwrap();
    assert!(current);
    let stored = repo.get_by_id("r1").await.unwrap();
    assert_eq!(stored.current_role_ids(), vec!["head"]);
    assert!(stored.updated_at.is_some());

    move_request(&db, stored, 1, RequestStatus::Rejected).await;
    let closed = repo
        .set_step_roles_if_at("r1", 1, &["deputy".to_string()], Utc::now())
        .await
        .unwrap();
    assert!(!closed);
}

#[tokio::test]
async fn test_in_flight_count_sees_the_deleting_transaction() {
    let db = Arc::new(in_memory().await.unwrap());
    insert_type(&db, "pt1", "domicile", None).await;
    let approved = insert_request(db.as_ref(), "r1", "pt1", None).await.unwrap();
    move_request(&db, approved, 0, RequestStatus::Approved).await;
    let types = PermitTypeRepository::new(db.clone());
    let requests = PermitRequestRepository::new(db.clone());

    let txn = db.begin().await.unwrap();
    let locked = types.lock_by_id_in(&txn, "pt1").await.unwrap();
    assert_eq!(locked.slug, "domicile");
    assert_eq!(requests.count_in_flight_by_type_in(&txn, "pt1").await.unwrap(), 0);

    insert_request(&txn, "r2", "pt1", None).await.unwrap();
    assert_eq!(requests.count_in_flight_by_type_in(&txn, "pt1").await.unwrap(), 1);
    assert_eq!(
        requests.find_closed_ids_by_type_in(&txn, "pt1").await.unwrap(),
        vec!["r1".to_string()]
    );
    txn.rollback().await.unwrap();

    let missing = types.lock_by_id_in(db.as_ref(), "missing").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    let missing = types.share_lock_by_id_in(db.as_ref(), "missing").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_insert_or_get_citizen_reuses_registered_nik() {
    let db = Arc::new(in_memory().await.unwrap());
    insert_type(&db, "pt1", "domicile", None).await;
    insert_request(db.as_ref(), "r1", "pt1", None).await.unwrap();
    let repo = CitizenRepository::new(db.clone());

    let citizen = repo
        .insert_or_get_in(
            db.as_ref(),
            "3201010101010001",
            citizen::ActiveModel {
                id: Set("c2".to_string()),
                nik: Set("3201010101010001".to_string()),
                name: Set("Ana Maria".to_string()),
                email: Set(None),
                phone: Set(None),
                address: Set(None),
                created_at: Set(Utc::now().into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(citizen.id, "c1");
    assert_eq!(citizen.name, "Ana");

    let fresh = repo
        .insert_or_get_in(
            db.as_ref(),
            "3201010101010002",
            citizen::ActiveModel {
                id: Set("c3".to_string()),
                nik: Set("3201010101010002".to_string()),
                name: Set("Budi".to_string()),
                email: Set(None),
                phone: Set(None),
                address: Set(None),
                created_at: Set(Utc::now().into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(fresh.id, "c3");
    assert_eq!(citizen::Entity::find().count(db.as_ref()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_delete_owned_then_request() {
    let db = Arc::new(in_memory().await.unwrap());
    insert_type(&db, "pt1", "domicile", None).await;
    insert_request(db.as_ref(), "r1", "pt1", None).await.unwrap();
    let repo = PermitRequestRepository::new(db.clone());

    let txn = db.begin().await.unwrap();
    repo.delete_owned_in(&txn, "r1").await.unwrap();
    repo.delete_in(&txn, "r1").await.unwrap();
    txn.commit().await.unwrap();

    assert!(repo.find_by_id("r1").await.unwrap().is_none());
    assert_eq!(citizen::Entity::find().count(db.as_ref()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reset_clears_rows() {
    let db = in_memory().await.unwrap();
    insert_type(&db, "pt1", "domicile", None).await;
    insert_request(&db, "r1", "pt1", None).await.unwrap();

    reset(&db).await.unwrap();

    assert_eq!(permit_request::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(permit_type::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_postgres_migrations_and_row_lock() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new((*test_db.connection()).clone());
    insert_type(&db, "pt1", "domicile", None).await;
    insert_request(db.as_ref(), "r1", "pt1", None).await.unwrap();
    let repo = PermitRequestRepository::new(db.clone());

    let txn = db.begin().await.unwrap();
    let locked = repo.lock_by_id_in(&txn, "r1").await.unwrap();
    assert_eq!(locked.status, RequestStatus::Submitted);
    txn.commit().await.unwrap();

    test_db.reset().await.unwrap();
    test_db.drop_database().await.unwrap();
}
