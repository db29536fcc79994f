//! Integration tests for PgStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::sync::Arc;
use std::time::Duration;

use leadgen_common::{Company, Contact, IdentityKey, JobPosting, Lead, LeadGenError};
use leadgen_dedup::{
    EntityLedger, FastCache, KeyTtl, LeadStore, MemoryFastCache, MergeEngine, MergeError, SeenEntityCache,
    SweepReport,
};
use leadgen_route::{Coordinate, RouteLeadSource};
use leadgen_store::{PgStore, ROUTE_PLANNED_ACTIVITY};
use sqlx::PgPool;

/// Get a migrated store on a clean database, or skip if no test DB is available.
async fn test_store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = PgStore::new(pool);
    store.migrate().await.ok()?;

    sqlx::query(
        "TRUNCATE seen_markers, lead_activities, leads, job_postings, contacts, companies RESTART IDENTITY CASCADE",
    )
    .execute(store.pool())
    .await
    .ok()?;

    Some(store)
}

fn company(name: &str, website: &str) -> Company {
    Company {
        name: name.to_string(),
        website: Some(website.to_string()),
        address: Some("100 Main St".to_string()),
        city: Some("Minneapolis".to_string()),
        state: Some("MN".to_string()),
        ..Default::default()
    }
}

async fn lead_with(store: &PgStore, company_id: i64, contact_id: Option<i64>, notes: Option<&str>, tags: &[&str]) -> i64 {
    let mut lead = Lead::new(0, company_id);
    lead.contact_id = contact_id;
    lead.notes = notes.map(str::to_string);
    lead.tags = tags.iter().map(|t| t.to_string()).collect();
    store.insert_lead(&lead).await.unwrap()
}

// =========================================================================
// Ledger
// =========================================================================

#[tokio::test]
async fn identity_lookups_use_normalized_columns() {
    let Some(store) = test_store().await else {
        return;
    };
    let company_id = store
        .insert_company(&company("Acme", "https://www.Acme.com/about"))
        .await
        .unwrap();
    store
        .insert_contact(&Contact {
            company_id,
            first_name: "Ada".into(),
            email: Some("  Ada@Acme.com ".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .insert_job_posting(&JobPosting {
            company_id,
            title: "Driver".into(),
            source: "indeed".into(),
            external_id: Some("abc123".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let company_key = IdentityKey::company("acme.com").unwrap();
    let contact_key = IdentityKey::contact("ada@acme.com").unwrap();
    let job_key = IdentityKey::job("indeed", "abc123").unwrap();
    let unknown = IdentityKey::company("other.com").unwrap();

    assert!(store.identity_exists(&company_key).await.unwrap());
    assert!(store.identity_exists(&contact_key).await.unwrap());
    assert!(store.identity_exists(&job_key).await.unwrap());
    assert!(!store.identity_exists(&unknown).await.unwrap());

    let counts = store.entity_counts().await.unwrap();
    assert_eq!((counts.companies, counts.jobs, counts.contacts, counts.leads), (1, 1, 1, 0));
}

#[tokio::test]
async fn duplicate_domain_is_a_validation_error() {
    let Some(store) = test_store().await else {
        return;
    };
    store.insert_company(&company("Acme", "acme.com")).await.unwrap();

    let err = store
        .insert_company(&company("Acme Again", "http://ACME.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, LeadGenError::Validation(_)));
}

#[tokio::test]
async fn seen_cache_writes_through_from_postgres() {
    let Some(store) = test_store().await else {
        return;
    };
    store.insert_company(&company("Acme", "acme.com")).await.unwrap();
    let fast = Arc::new(MemoryFastCache::new());
    let cache = SeenEntityCache::new(fast.clone(), Arc::new(store.clone()), Duration::from_secs(3600));

    assert!(cache.is_company_seen("www.acme.com").await.unwrap());
    assert_eq!(fast.len(), 1);
    assert!(!cache.is_company_seen("unknown.com").await.unwrap());
    assert_eq!(fast.len(), 1);
}

// =========================================================================
// Marker cache
// =========================================================================

#[tokio::test]
async fn marks_survive_a_new_cache_instance() {
    let Some(store) = test_store().await else {
        return;
    };
    let ttl = Duration::from_secs(3600);
    let key = IdentityKey::company("acme.com").unwrap();

    let first_run = SeenEntityCache::new(Arc::new(store.marker_cache()), Arc::new(store.clone()), ttl);
    first_run.mark(&key).await;

    let second_run = SeenEntityCache::new(Arc::new(store.marker_cache()), Arc::new(store.clone()), ttl);
    assert!(second_run.seen(&key).await.unwrap());
    assert_eq!(second_run.stats().await.unwrap().cache_entries, Some(1));

    match store.marker_cache().ttl(&key.cache_key()).await.unwrap() {
        KeyTtl::Expires(left) => assert!(left <= ttl && left > Duration::from_secs(3500)),
        other => panic!("expected an expiring marker, got {other:?}"),
    }
}

#[tokio::test]
async fn sweep_purges_lapsed_and_unexpiring_markers() {
    let Some(store) = test_store().await else {
        return;
    };
    let markers = store.marker_cache();
    markers.set_with_ttl("seen:company:live.com", Duration::from_secs(3600)).await.unwrap();
    sqlx::query(
        r#"
        INSERT INTO seen_markers (key, expires_at) VALUES
            ('seen:company:old.com', now() - interval '1 minute'),
            ('seen:contact:old@old.com', now() - interval '1 day'),
            ('seen:company:forever.com', NULL)
        "#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    assert!(!markers.exists("seen:company:old.com").await.unwrap());
    assert_eq!(markers.ttl("seen:company:forever.com").await.unwrap(), KeyTtl::Persistent);

    let cache = SeenEntityCache::new(Arc::new(markers.clone()), Arc::new(store.clone()), Duration::from_secs(3600));
    let report = cache.sweep().await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            expired: 2,
            unexpiring: 1
        }
    );

    let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seen_markers")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(left, 1);
    assert_eq!(
        markers.keys_with_prefix("seen:").await.unwrap(),
        vec!["seen:company:live.com".to_string()]
    );
}

// =========================================================================
// Merge
// =========================================================================

#[tokio::test]
async fn merge_moves_activities_and_unions_fields() {
    let Some(store) = test_store().await else {
        return;
    };
    let company_id = store.insert_company(&company("Acme", "acme.com")).await.unwrap();
    let primary = lead_with(&store, company_id, None, Some("first"), &["a", "b"]).await;
    let secondary = lead_with(&store, company_id, None, Some("second"), &["b", "c"]).await;
    for _ in 0..2 {
        store.insert_activity(primary, "note", None, None).await.unwrap();
    }
    for _ in 0..3 {
        store.insert_activity(secondary, "call", Some("left voicemail"), None).await.unwrap();
    }

    let engine = MergeEngine::new(Arc::new(store.clone()));
    let report = engine.merge(primary, &[secondary]).await.unwrap();

    assert_eq!(report.merged, vec![secondary]);
    assert_eq!(report.activities_moved, 3);
    assert_eq!(store.lead_activities(primary).await.unwrap().len(), 5);
    assert!(matches!(
        store.get_lead(secondary).await,
        Err(LeadGenError::NotFound { entity: "lead", .. })
    ));

    let merged = store.get_lead(primary).await.unwrap();
    assert_eq!(merged.tags, vec!["a", "b", "c"]);
    assert_eq!(
        merged.notes.as_deref(),
        Some(format!("first\n\n--- Merged from Lead #{secondary} ---\nsecond").as_str())
    );
}

#[tokio::test]
async fn merge_into_missing_primary_changes_nothing() {
    let Some(store) = test_store().await else {
        return;
    };
    let company_id = store.insert_company(&company("Acme", "acme.com")).await.unwrap();
    let lead = lead_with(&store, company_id, None, None, &[]).await;

    let engine = MergeEngine::new(Arc::new(store.clone()));
    let err = engine.merge(9_999, &[lead]).await.unwrap_err();

    assert!(matches!(err, MergeError::PrimaryNotFound(9_999)));
    assert!(store.get_lead(lead).await.is_ok());
}

#[tokio::test]
async fn duplicate_groups_share_company_and_contact() {
    let Some(store) = test_store().await else {
        return;
    };
    let company_id = store.insert_company(&company("Acme", "acme.com")).await.unwrap();
    let contact_id = store
        .insert_contact(&Contact {
            company_id,
            first_name: "Ada".into(),
            email: Some("ada@acme.com".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let a = lead_with(&store, company_id, Some(contact_id), None, &[]).await;
    let b = lead_with(&store, company_id, Some(contact_id), None, &[]).await;
    lead_with(&store, company_id, None, None, &[]).await;
    lead_with(&store, company_id, None, None, &[]).await;

    let groups = store.duplicate_groups().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].rule, "company_contact");
    assert_eq!(groups[0].lead_ids, vec![a, b]);
    assert_eq!(groups[0].count, 2);
}

// =========================================================================
// Route source
// =========================================================================

#[tokio::test]
async fn route_source_round_trips_coordinates_and_activities() {
    let Some(store) = test_store().await else {
        return;
    };
    let company_id = store.insert_company(&company("Acme", "acme.com")).await.unwrap();
    let lead = lead_with(&store, company_id, None, None, &[]).await;

    store
        .save_company_coordinates(company_id, Coordinate::new(44.98, -93.27))
        .await
        .unwrap();
    let rows = store.leads_with_companies(&[lead, 9_999]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].company.coordinates(), Some((44.98, -93.27)));
    assert_eq!(store.get_company(company_id).await.unwrap().coordinates(), Some((44.98, -93.27)));
    assert!(matches!(
        store.get_company(9_999).await,
        Err(LeadGenError::NotFound { entity: "company", .. })
    ));

    store.record_route_planned(&[lead]).await.unwrap();
    let activities = store.lead_activities(lead).await.unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].activity_type, ROUTE_PLANNED_ACTIVITY);
    assert_eq!(activities[0].description.as_deref(), Some("Included in route plan"));
}
