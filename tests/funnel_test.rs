use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use duckdb::Connection;
use funnel_analytics::api::AppState;
use funnel_analytics::clock::{Clock, ManualClock};
use funnel_analytics::query::cache::QueryCache;
use funnel_analytics::query::metric_set::FunnelTable;
use funnel_analytics::query::service::FunnelQueryService;
use funnel_analytics::server::build_router;
use funnel_analytics::storage::migrations::run_migrations;
use funnel_analytics::warehouse::auth::{
    Authenticator, Identity, InteractiveAuthenticator, StoredCredentialAuthenticator,
};
use funnel_analytics::warehouse::embedded::DuckDbWarehouse;
use funnel_analytics::warehouse::session::WarehouseSession;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const WINDOW: &str = "start_date=2024-01-01&end_date=2024-01-07";

/// Checkouts straddling every FICO and order-value boundary, plus two rows
/// just outside the window.
const SEED: &str = "
    ('c01', DATE '2024-01-01', 579,  100.00,  1, 0, NULL, NULL,  NULL, NULL, NULL, NULL, NULL),
    ('c02', DATE '2024-01-02', 580,  149.99,  1, 1, 6,    NULL,  NULL, NULL, NULL, NULL, NULL),
    ('c03', DATE '2024-01-03', 669,  150.00,  1, 0, NULL, NULL,  NULL, NULL, NULL, NULL, NULL),
    ('c04', DATE '2024-01-04', 670,  499.99,  1, 1, 12,   NULL,  NULL, NULL, NULL, NULL, NULL),
    ('c05', DATE '2024-01-05', 739,  500.00,  0, 0, NULL, NULL,  NULL, NULL, NULL, NULL, NULL),
    ('c06', DATE '2024-01-06', 740,  999.99,  1, 0, NULL, NULL,  NULL, NULL, NULL, NULL, NULL),
    ('c07', DATE '2024-01-07', 799,  1000.00, 1, 1, 12,   0.000, 6,    9.990, 12,  NULL, NULL),
    ('c08', DATE '2024-01-07', 800,  2500.00, 1, 0, NULL, 0.000, 12,   0.000, 18,  14.990, 24),
    ('c09', DATE '2024-01-03', NULL, 1200.00, 1, 0, NULL, 19.990, 12,  NULL, NULL, NULL, NULL),
    ('c10', DATE '2024-01-08', 750,  1500.00, 1, 0, NULL, NULL,  NULL, NULL, NULL, NULL, NULL),
    ('c11', DATE '2023-12-31', 750,  1500.00, 1, 0, NULL, NULL,  NULL, NULL, NULL, NULL, NULL)
";

struct Harness {
    state: Arc<AppState>,
    clock: Arc<ManualClock>,
    /// Second handle on the warehouse database for mutating rows mid-test.
    conn: Connection,
    prompts: Arc<AtomicUsize>,
}

fn table() -> FunnelTable {
    FunnelTable::new(None, Some("dbt_analytics"), "checkout_funnel_v5").unwrap()
}

fn identity() -> Identity {
    Identity {
        account: "acme-prod".to_string(),
        user: "analyst".to_string(),
        warehouse: "SHARED".to_string(),
    }
}

fn seeded_warehouse() -> DuckDbWarehouse {
    let warehouse = DuckDbWarehouse::open(None).unwrap();
    let table = table();
    run_migrations(warehouse.connection(), &table).unwrap();
    warehouse
        .connection()
        .execute_batch(&format!("INSERT INTO {table} VALUES {SEED}"))
        .unwrap();
    warehouse
}

fn harness(interactive: bool, cache_ttl_secs: u64) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let prompts = Arc::new(AtomicUsize::new(0));

    let authenticator: Box<dyn Authenticator> = if interactive {
        let counter = Arc::clone(&prompts);
        Box::new(InteractiveAuthenticator::new(
            Box::new(move |_: &Identity| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
            Duration::hours(1),
        ))
    } else {
        Box::new(StoredCredentialAuthenticator::new(
            "s3cret".to_string(),
            Duration::hours(1),
        ))
    };
    let auth_method = authenticator.method();

    let warehouse = seeded_warehouse();
    let conn = warehouse.connection().try_clone().unwrap();
    let session = WarehouseSession::new(
        warehouse,
        authenticator,
        identity(),
        Arc::clone(&dyn_clock),
    );
    let cache = QueryCache::new(cache_ttl_secs, Arc::clone(&dyn_clock));

    let state = Arc::new(AppState {
        service: FunnelQueryService::new(Box::new(session), cache, table()),
        clock: dyn_clock,
        auth_method,
        dashboard_origin: None,
    });
    Harness {
        state,
        clock,
        conn,
        prompts,
    }
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state))
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

fn row<'a>(rows: &'a Value, key: &str, label: &str) -> &'a Value {
    rows.as_array()
        .unwrap()
        .iter()
        .find(|r| r[key] == label)
        .unwrap_or_else(|| panic!("no row {label}"))
}

#[tokio::test]
async fn test_fico_dropoff_buckets_and_window_bounds() {
    let h = harness(false, 3600);
    let (status, json) = get(&h.state, &format!("/api/views/fico-dropoff?{WINDOW}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["no_data"], false);
    assert_eq!(json["source"], "dbt_analytics.checkout_funnel_v5");

    let rows = &json["rows"];
    let labels: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["fico_bucket"].as_str().unwrap())
        .collect();
    assert_eq!(
        labels,
        [
            "Exceptional (800+)",
            "Very Good (740-799)",
            "Good (670-739)",
            "Fair (580-669)",
            "Poor (<580)",
            "No Score",
        ]
    );

    let poor = row(rows, "fico_bucket", "Poor (<580)");
    assert_eq!(poor["approved"], 1);
    assert_eq!(poor["dropoff_pct"], 100.0);

    let fair = row(rows, "fico_bucket", "Fair (580-669)");
    assert_eq!(fair["total_checkouts"], 2);
    assert_eq!(fair["dropoff_pct"], 50.0);

    // c05 was not approved, so Good has one approval and no dropoff.
    let good = row(rows, "fico_bucket", "Good (670-739)");
    assert_eq!(good["total_checkouts"], 2);
    assert_eq!(good["approved"], 1);
    assert_eq!(good["dropoff_pct"], 0.0);

    // c10 and c11 fall outside the window.
    let very_good = row(rows, "fico_bucket", "Very Good (740-799)");
    assert_eq!(very_good["total_checkouts"], 2);

    assert_eq!(json["chart"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_summary_totals() {
    let h = harness(false, 3600);
    let (status, json) = get(&h.state, &format!("/api/views/summary?{WINDOW}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_approved"], 8);
    assert_eq!(json["term_selected"], 3);
    assert_eq!(json["dropped_off"], 5);
    assert_eq!(json["overall_dropoff_pct"], 62.5);
}

#[tokio::test]
async fn test_named_period_counts_back_from_today() {
    // Today is 2024-01-08: 7d keeps c01 (exactly seven days back) and c10
    // (today), and drops c11 from the day before.
    let h = harness(false, 3600);
    let (status, json) = get(&h.state, "/api/views/summary?period=7d").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["window"]["start"], "2024-01-01");
    assert_eq!(json["window"]["end"], "2024-01-08");
    assert_eq!(json["total_approved"], 9);
}

#[tokio::test]
async fn test_term_selection_rates() {
    let h = harness(false, 3600);
    let (status, json) = get(&h.state, &format!("/api/views/term-selection?{WINDOW}")).await;
    assert_eq!(status, StatusCode::OK);

    let fair = row(&json["rows"], "fico_bucket", "Fair (580-669)");
    assert_eq!(fair["confirm_rate_with_term"], 100.0);
    assert_eq!(fair["confirm_rate_without_term"], 0.0);

    let poor = row(&json["rows"], "fico_bucket", "Poor (<580)");
    assert_eq!(poor["with_term_selected"], 0);
    assert!(poor["confirm_rate_with_term"].is_null());

    // No Score is kept in the table but left out of the chart series.
    assert_eq!(json["series"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_aov_dropoff_and_heatmap() {
    let h = harness(false, 3600);
    let (status, json) = get(&h.state, &format!("/api/views/aov?{WINDOW}")).await;
    assert_eq!(status, StatusCode::OK);

    let rows = &json["rows"];
    assert_eq!(row(rows, "aov_bucket", "a. <$150")["dropoff_pct"], 50.0);
    assert_eq!(row(rows, "aov_bucket", "b. $150-$500")["dropoff_pct"], 50.0);
    assert_eq!(row(rows, "aov_bucket", "c. $500-$1000")["approved"], 1);
    assert_eq!(row(rows, "aov_bucket", "d. $1000+")["dropoff_pct"], 66.7);

    let heatmap = &json["heatmap"];
    assert_eq!(heatmap["rows"][0], "High FICO (740+)");
    assert_eq!(heatmap["columns"][3], "$1000+");
    let values = &heatmap["values"];
    assert!(values[0][0].is_null());
    assert_eq!(values[0][2], 100.0);
    assert_eq!(values[0][3], 50.0);
    // Good x $500-$1000 has a checkout but no approvals.
    assert!(values[1][2].is_null());
    assert_eq!(values[2][1], 100.0);
    assert_eq!(values[3][0], 100.0);
}

#[tokio::test]
async fn test_zero_apr_buckets() {
    let h = harness(false, 3600);
    let (status, json) = get(&h.state, &format!("/api/views/zero-apr?{WINDOW}")).await;
    assert_eq!(status, StatusCode::OK);

    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["zero_apr_bucket"], "a. No 0% APR");
    assert_eq!(rows[0]["dropoff_rate"], 100.0);
    assert_eq!(rows[1]["zero_apr_bucket"], "b. 0% for 1-6 mo");
    assert_eq!(rows[1]["completion_rate"], 100.0);
    assert_eq!(rows[2]["zero_apr_bucket"], "d. 0% for 13+ mo");
    assert_eq!(rows[2]["completed"], 0);
}

#[tokio::test]
async fn test_bucket_filter_narrows_every_view() {
    let h = harness(false, 3600);
    let (status, json) = get(
        &h.state,
        &format!("/api/views/summary?{WINDOW}&fico_bucket=very_good"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["window"]["filter"]["fico_bucket"], "very_good");
    assert_eq!(json["total_approved"], 2);

    let (_, json) = get(
        &h.state,
        &format!("/api/views/fico-dropoff?{WINDOW}&aov_bucket=under_150"),
    )
    .await;
    assert_eq!(json["rows"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_window_is_ok_with_no_data() {
    let h = harness(false, 3600);
    let (status, json) = get(
        &h.state,
        "/api/views/aov?start_date=2022-06-01&end_date=2022-06-30",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["no_data"], true);
    assert!(json["rows"].as_array().unwrap().is_empty());
    assert!(json["heatmap"]["values"][0][0].is_null());
}

#[tokio::test]
async fn test_cached_result_served_until_ttl() {
    let h = harness(false, 3600);
    let uri = format!("/api/views/summary?{WINDOW}");

    let (_, first) = get(&h.state, &uri).await;
    assert_eq!(first["total_approved"], 8);
    assert_eq!(h.state.service.queries_executed(), 1);

    h.conn
        .execute_batch(
            "INSERT INTO dbt_analytics.checkout_funnel_v5 (CHECKOUT_ID, CHECKOUT_CREATED_DT, FICO_SCORE, TOTAL_AMOUNT, IS_APPROVED)
             VALUES ('c12', DATE '2024-01-05', 700, 300.00, 1)",
        )
        .unwrap();

    h.clock.advance(Duration::seconds(3599));
    let (_, cached) = get(&h.state, &uri).await;
    assert_eq!(cached["total_approved"], 8);
    assert_eq!(cached["fetched_at"], first["fetched_at"]);
    assert_eq!(h.state.service.queries_executed(), 1);

    h.clock.advance(Duration::seconds(2));
    let (_, fresh) = get(&h.state, &uri).await;
    assert_eq!(fresh["total_approved"], 9);
    assert_ne!(fresh["fetched_at"], first["fetched_at"]);
    assert_eq!(h.state.service.queries_executed(), 2);
}

#[tokio::test]
async fn test_different_windows_cached_separately() {
    let h = harness(false, 3600);
    get(&h.state, &format!("/api/views/summary?{WINDOW}")).await;
    get(
        &h.state,
        "/api/views/summary?start_date=2024-01-01&end_date=2024-01-06",
    )
    .await;
    assert_eq!(h.state.service.queries_executed(), 2);
    assert_eq!(h.state.service.cache().len(), 2);
}

#[tokio::test]
async fn test_stored_credential_renews_silently() {
    let h = harness(false, 0);
    let uri = format!("/api/views/zero-apr?{WINDOW}");

    let (status, _) = get(&h.state, &uri).await;
    assert_eq!(status, StatusCode::OK);

    h.clock.advance(Duration::hours(2));
    let (status, _) = get(&h.state, &uri).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_interactive_session_requires_login() {
    let h = harness(true, 0);
    let uri = format!("/api/views/zero-apr?{WINDOW}");

    let (status, _) = get(&h.state, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.prompts.load(Ordering::SeqCst), 1);

    h.clock.advance(Duration::hours(2));
    let (status, json) = get(&h.state, &uri).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("expired"));
    assert_eq!(h.prompts.load(Ordering::SeqCst), 1);

    let (status, _) = get(&h.state, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.prompts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let h = harness(false, 3600);
    h.conn
        .execute_batch("ALTER TABLE dbt_analytics.checkout_funnel_v5 RENAME TO gone")
        .unwrap();

    let uri = format!("/api/views/summary?{WINDOW}");
    let (status, _) = get(&h.state, &uri).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(h.state.service.cache().is_empty());

    h.conn
        .execute_batch("ALTER TABLE dbt_analytics.gone RENAME TO checkout_funnel_v5")
        .unwrap();
    let (status, json) = get(&h.state, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_approved"], 8);
}
