//! Integration tests for the sync engine and the concrete jobs.
//!
//! These tests require the `sqlite` and `migrate` features to be enabled
//! and use an in-memory SQLite database with fake feed sources.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use celestine::address::{ACCOUNT_PREFIX, encode};
use celestine::connect_and_migrate;
use celestine::entity::{celestial, price, sync_state as sync_state_entity};
use celestine::repository::{self, CursorQuery, cursor_list, sync_state};
use celestine::source::{
    Candle, CandleSource, Change, ChangeSource, Changes, ChangesRequest, Interval, OhlcArgs,
    SourceError,
};
use celestine::sync::jobs::{
    CelestialJob, CelestialJobConfig, IDENTITY_JOB_NAME, PRICE_JOB_NAME, PriceJob,
    PriceJobConfig,
};
use celestine::sync::{ChangeId, EngineState, SyncConfig, SyncEngine, SyncError, writer};
use sea_orm::{ActiveValue::NotSet, DatabaseConnection, Set};
use tokio_util::sync::CancellationToken;

/// Create an in-memory SQLite database with migrations applied.
async fn setup_test_db() -> Arc<DatabaseConnection> {
    Arc::new(
        connect_and_migrate("sqlite::memory:")
            .await
            .expect("Failed to create test database"),
    )
}

fn sync_config() -> SyncConfig {
    SyncConfig {
        drain_delay: Duration::ZERO,
        ..SyncConfig::default()
    }
}

/// 2023-10-31T00:00:00Z plus `n` minutes.
fn minute(n: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_698_710_400, 0).expect("ts") + TimeDelta::minutes(n)
}

fn candle(n: i64, close: f64) -> Candle {
    Candle {
        open_time: minute(n),
        open: close,
        high: close,
        low: close,
        close,
    }
}

/// Candle source replaying scripted pages and recording each `startTime`.
#[derive(Clone, Default)]
struct FakeCandles {
    pages: Arc<Mutex<VecDeque<Result<Vec<Candle>, SourceError>>>>,
    starts: Arc<Mutex<Vec<i64>>>,
    ends: Arc<Mutex<Vec<Option<i64>>>>,
}

impl FakeCandles {
    fn with_pages(pages: Vec<Vec<Candle>>) -> Self {
        let fake = Self::default();
        for page in pages {
            fake.push(Ok(page));
        }
        fake
    }

    fn push(&self, page: Result<Vec<Candle>, SourceError>) {
        self.pages.lock().expect("pages").push_back(page);
    }

    fn starts(&self) -> Vec<i64> {
        self.starts.lock().expect("starts").clone()
    }

    fn ends(&self) -> Vec<Option<i64>> {
        self.ends.lock().expect("ends").clone()
    }
}

#[async_trait]
impl CandleSource for FakeCandles {
    async fn ohlc(
        &self,
        _symbol: &str,
        _interval: Interval,
        args: &OhlcArgs,
    ) -> Result<Vec<Candle>, SourceError> {
        self.starts
            .lock()
            .expect("starts")
            .push(args.start.timestamp_millis());
        self.ends
            .lock()
            .expect("ends")
            .push(args.end.map(|end| end.timestamp_millis()));
        self.pages
            .lock()
            .expect("pages")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Change source replaying scripted pages and recording `from_change_id`.
#[derive(Clone, Default)]
struct FakeChanges {
    pages: Arc<Mutex<VecDeque<Vec<Change>>>>,
    froms: Arc<Mutex<Vec<i64>>>,
    cancel_on_call: Option<CancellationToken>,
}

#[async_trait]
impl ChangeSource for FakeChanges {
    async fn changes(&self, request: &ChangesRequest) -> Result<Changes, SourceError> {
        self.froms
            .lock()
            .expect("froms")
            .push(request.from_change_id);
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        let changes = self.pages.lock().expect("pages").pop_front().unwrap_or_default();
        Ok(Changes {
            head: changes.iter().map(|c| c.change_id).max().unwrap_or(0),
            changes,
        })
    }
}

fn price_job(source: FakeCandles, limit: u32) -> PriceJob<FakeCandles> {
    PriceJob::new(
        source,
        PriceJobConfig {
            limit,
            start_time: minute(0),
            ..PriceJobConfig::default()
        },
    )
}

async fn insert_address(db: &DatabaseConnection, n: u8) -> (i64, String) {
    let hash = vec![n; 20];
    let bech32 = encode(ACCOUNT_PREFIX, &hash).expect("encode");
    let row = repository::address::insert(db, 1, hash, bech32.clone())
        .await
        .expect("insert address");
    (row.id, bech32)
}

fn change(celestial_id: &str, address: &str, change_id: i64) -> Change {
    Change {
        celestial_id: celestial_id.to_string(),
        address: address.to_string(),
        image_url: Some(format!("https://img.example.com/{celestial_id}.png")),
        change_id,
    }
}

async fn all_prices(db: &DatabaseConnection) -> Vec<price::Model> {
    cursor_list::<price::Entity, _>(db, CursorQuery::after(0, 100))
        .await
        .expect("prices")
}

async fn all_celestials(db: &DatabaseConnection) -> Vec<celestial::Model> {
    cursor_list::<celestial::Entity, _>(db, CursorQuery::after(0, 100))
        .await
        .expect("celestials")
}

// ─── Candle job ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_candle_cycle_advances_checkpoint_and_steps_past_it() {
    let db = setup_test_db().await;
    sync_state::advance(db.as_ref(), PRICE_JOB_NAME, minute(0).timestamp())
        .await
        .expect("seed checkpoint");

    let source = FakeCandles::with_pages(vec![vec![candle(1, 3.1), candle(2, 3.2), candle(3, 3.3)]]);
    let mut engine = SyncEngine::start(Arc::clone(&db), price_job(source.clone(), 3), sync_config())
        .await
        .expect("start");
    assert_eq!(engine.checkpoint(), minute(0));

    let report = engine.tick(&CancellationToken::new()).await.expect("tick");

    assert_eq!(report.fetches, 2);
    assert_eq!(report.applied, 3);
    assert_eq!(engine.checkpoint(), minute(3));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(all_prices(db.as_ref()).await.len(), 3);
    // 00:01 from the seeded checkpoint, then 00:03 + 1 minute
    assert_eq!(source.starts(), vec![1_698_710_460_000, 1_698_710_640_000]);

    let stored = sync_state::load(db.as_ref(), PRICE_JOB_NAME).await.expect("checkpoint");
    assert_eq!(stored.position, minute(3).timestamp());
}

#[tokio::test]
async fn test_drain_loop_fetches_until_short_page() {
    let db = setup_test_db().await;
    let source = FakeCandles::with_pages(vec![
        vec![candle(0, 1.0), candle(1, 1.0)],
        vec![candle(2, 1.0), candle(3, 1.0)],
        vec![candle(4, 1.0)],
    ]);
    let mut engine = SyncEngine::start(Arc::clone(&db), price_job(source.clone(), 2), sync_config())
        .await
        .expect("start");

    let report = engine.tick(&CancellationToken::new()).await.expect("tick");

    assert_eq!(report.fetches, 3);
    assert_eq!(source.starts().len(), 3);
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(engine.checkpoint(), minute(4));
    assert_eq!(all_prices(db.as_ref()).await.len(), 5);
}

#[tokio::test]
async fn test_fresh_store_starts_at_configured_start_time() {
    let db = setup_test_db().await;
    let source = FakeCandles::default();
    let mut engine = SyncEngine::start(Arc::clone(&db), price_job(source.clone(), 10), sync_config())
        .await
        .expect("start");

    engine.tick(&CancellationToken::new()).await.expect("tick");

    assert_eq!(source.starts(), vec![minute(0).timestamp_millis()]);
    // Empty page leaves the initialized checkpoint alone
    let stored = sync_state::load(db.as_ref(), PRICE_JOB_NAME).await.expect("checkpoint");
    assert_eq!(stored.position, minute(-1).timestamp());
}

#[tokio::test]
async fn test_restart_resumes_from_latest_stored_candle() {
    let db = setup_test_db().await;
    repository::price::upsert_candles(
        db.as_ref(),
        vec![price::ActiveModel {
            id: NotSet,
            currency: Set("TIAUSDT".to_string()),
            time: Set(minute(30).fixed_offset()),
            open: Set(1.0),
            high: Set(1.0),
            low: Set(1.0),
            close: Set(1.0),
        }],
    )
    .await
    .expect("seed candle");

    let engine = SyncEngine::start(Arc::clone(&db), price_job(FakeCandles::default(), 10), sync_config())
        .await
        .expect("start");
    assert_eq!(engine.checkpoint(), minute(30));
}

#[tokio::test]
async fn test_duplicate_keys_in_page_keep_last_record() {
    let db = setup_test_db().await;
    let source = FakeCandles::with_pages(vec![vec![candle(1, 3.0), candle(1, 4.0)]]);
    let mut engine = SyncEngine::start(Arc::clone(&db), price_job(source, 10), sync_config())
        .await
        .expect("start");

    let report = engine.tick(&CancellationToken::new()).await.expect("tick");

    assert_eq!(report.applied, 1);
    let rows = all_prices(db.as_ref()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close, 4.0);
}

#[tokio::test]
async fn test_open_candle_is_left_for_a_later_cycle() {
    let db = setup_test_db().await;
    let hour = TimeDelta::hours(1);
    let now = Utc::now();
    let current = DateTime::from_timestamp(now.timestamp() / 3_600 * 3_600, 0).expect("ts");
    let closed = current - hour;
    let candle_at = |open_time: DateTime<Utc>| Candle {
        open_time,
        open: 2.0,
        high: 2.5,
        low: 1.5,
        close: 2.2,
    };

    let source = FakeCandles::with_pages(vec![vec![candle_at(closed), candle_at(current)]]);
    let job = PriceJob::new(
        source.clone(),
        PriceJobConfig {
            interval: Interval::OneHour,
            start_time: closed,
            ..PriceJobConfig::default()
        },
    );
    let mut engine = SyncEngine::start(Arc::clone(&db), job, sync_config())
        .await
        .expect("start");

    let report = engine.tick(&CancellationToken::new()).await.expect("tick");

    assert_eq!(report.applied, 1);
    assert_eq!(engine.checkpoint(), closed);
    let rows = all_prices(db.as_ref()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time.with_timezone(&Utc), closed);

    // The request itself is capped one interval before the fetch time
    let end = source.ends()[0].expect("end bound sent");
    assert!(end >= (now - hour).timestamp_millis());
    assert!(end <= (Utc::now() - hour).timestamp_millis());

    // The next cycle asks for the open candle again
    engine.tick(&CancellationToken::new()).await.expect("second tick");
    assert_eq!(source.starts()[1], current.timestamp_millis());
}

#[tokio::test]
async fn test_source_failure_leaves_checkpoint_untouched() {
    let db = setup_test_db().await;
    sync_state::advance(db.as_ref(), PRICE_JOB_NAME, minute(0).timestamp())
        .await
        .expect("seed checkpoint");

    let source = FakeCandles::default();
    source.push(Err(SourceError::Status {
        status: 503,
        body: "maintenance".to_string(),
    }));
    let mut engine = SyncEngine::start(Arc::clone(&db), price_job(source, 10), sync_config())
        .await
        .expect("start");

    let err = engine
        .tick(&CancellationToken::new())
        .await
        .expect_err("503 fails the cycle");

    assert!(err.is_transient());
    assert_eq!(engine.checkpoint(), minute(0));
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(all_prices(db.as_ref()).await.is_empty());
}

#[tokio::test]
async fn test_replaying_committed_batch_is_idempotent() {
    let db = setup_test_db().await;
    let job = price_job(FakeCandles::default(), 10);
    let batch = vec![candle(1, 3.1), candle(2, 3.2)];

    writer::apply_batch(db.as_ref(), &job, &batch, minute(2)).await.expect("first");
    let before = all_prices(db.as_ref()).await;

    writer::apply_batch(db.as_ref(), &job, &batch, minute(2)).await.expect("replay");
    let after = all_prices(db.as_ref()).await;

    assert_eq!(before, after);
    let stored = sync_state::load(db.as_ref(), PRICE_JOB_NAME).await.expect("checkpoint");
    assert_eq!(stored.position, minute(2).timestamp());
}

#[tokio::test]
async fn test_writer_refuses_to_move_checkpoint_back() {
    let db = setup_test_db().await;
    let job = price_job(FakeCandles::default(), 10);

    writer::apply_batch(db.as_ref(), &job, &[candle(5, 1.0)], minute(5))
        .await
        .expect("forward");
    let err = writer::apply_batch(db.as_ref(), &job, &[candle(1, 9.0)], minute(1))
        .await
        .expect_err("backward");

    assert!(matches!(err, SyncError::Repository(_)));
    // The candle written before the refused advance was rolled back
    let rows = all_prices(db.as_ref()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].time.with_timezone(&Utc), minute(5));
}

#[tokio::test]
async fn test_cancelled_tick_changes_nothing() {
    let db = setup_test_db().await;
    let source = FakeCandles::with_pages(vec![vec![candle(1, 1.0)]]);
    let mut engine = SyncEngine::start(Arc::clone(&db), price_job(source, 10), sync_config())
        .await
        .expect("start");
    let before = engine.checkpoint();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine.tick(&cancel).await.expect_err("cancelled");

    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(engine.checkpoint(), before);
    assert!(all_prices(db.as_ref()).await.is_empty());
}

// ─── Identity job ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_identity_cycle_resolves_address_by_hash() {
    let db = setup_test_db().await;
    let (address_id, bech32) = insert_address(db.as_ref(), 5).await;

    let source = FakeChanges::default();
    source
        .pages
        .lock()
        .expect("pages")
        .push_back(vec![change("alice", &bech32, 4)]);

    let job = CelestialJob::new(source.clone(), CelestialJobConfig::default());
    let mut engine = SyncEngine::start(Arc::clone(&db), job, sync_config())
        .await
        .expect("start");
    assert_eq!(engine.checkpoint(), ChangeId(0));

    let report = engine.tick(&CancellationToken::new()).await.expect("tick");

    assert_eq!(report.fetches, 1);
    assert_eq!(engine.checkpoint(), ChangeId(4));
    assert_eq!(*source.froms.lock().expect("froms"), vec![0]);

    let rows = all_celestials(db.as_ref()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].celestial_id, "alice");
    assert_eq!(rows[0].address_id, address_id);
    assert_eq!(rows[0].change_id, 4);
    assert_eq!(rows[0].image_url, "https://img.example.com/alice.png");

    let stored = sync_state::load(db.as_ref(), IDENTITY_JOB_NAME).await.expect("checkpoint");
    assert_eq!(stored.position, 4);
}

#[tokio::test]
async fn test_unresolvable_change_rolls_back_whole_batch() {
    let db = setup_test_db().await;
    let (_, known) = insert_address(db.as_ref(), 1).await;
    let unknown = encode(ACCOUNT_PREFIX, &[2u8; 20]).expect("encode");

    let source = FakeChanges::default();
    source
        .pages
        .lock()
        .expect("pages")
        .push_back(vec![change("alice", &known, 1), change("bob", &unknown, 2)]);

    let job = CelestialJob::new(source, CelestialJobConfig::default());
    let mut engine = SyncEngine::start(Arc::clone(&db), job, sync_config())
        .await
        .expect("start");

    let err = engine
        .tick(&CancellationToken::new())
        .await
        .expect_err("bob has no address");

    assert!(matches!(err, SyncError::UnknownAddress { ref address } if *address == unknown));
    assert_eq!(engine.checkpoint(), ChangeId(0));
    assert!(all_celestials(db.as_ref()).await.is_empty());
    assert_eq!(
        sync_state::load(db.as_ref(), IDENTITY_JOB_NAME).await.expect("checkpoint").position,
        0
    );
}

#[tokio::test]
async fn test_unknown_address_holds_checkpoint_until_indexed() {
    let db = setup_test_db().await;
    let unknown = encode(ACCOUNT_PREFIX, &[2u8; 20]).expect("encode");
    let page = vec![change("bob", &unknown, 1), change("carol", &unknown, 2)];

    let source = FakeChanges::default();
    for _ in 0..3 {
        source.pages.lock().expect("pages").push_back(page.clone());
    }

    let job = CelestialJob::new(source.clone(), CelestialJobConfig::default());
    let mut engine = SyncEngine::start(Arc::clone(&db), job, sync_config())
        .await
        .expect("start");

    for _ in 0..2 {
        let err = engine
            .tick(&CancellationToken::new())
            .await
            .expect_err("address not indexed yet");
        assert!(matches!(err, SyncError::UnknownAddress { .. }));
        assert_eq!(engine.checkpoint(), ChangeId(0));
    }

    insert_address(db.as_ref(), 2).await;
    engine.tick(&CancellationToken::new()).await.expect("tick");

    assert_eq!(*source.froms.lock().expect("froms"), vec![0, 0, 0]);
    assert_eq!(engine.checkpoint(), ChangeId(2));
    assert_eq!(all_celestials(db.as_ref()).await.len(), 2);
}

#[tokio::test]
async fn test_undecodable_address_fails_cycle() {
    let db = setup_test_db().await;
    let source = FakeChanges::default();
    source
        .pages
        .lock()
        .expect("pages")
        .push_back(vec![change("carol", "not-bech32", 1)]);

    let job = CelestialJob::new(source, CelestialJobConfig::default());
    let mut engine = SyncEngine::start(Arc::clone(&db), job, sync_config())
        .await
        .expect("start");

    let err = engine.tick(&CancellationToken::new()).await.expect_err("bad address");
    assert!(matches!(err, SyncError::InvalidAddress(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_start_rejects_corrupt_checkpoint() {
    let db = setup_test_db().await;
    repository::save(
        db.as_ref(),
        sync_state_entity::ActiveModel {
            id: NotSet,
            name: Set(IDENTITY_JOB_NAME.to_string()),
            position: Set(-5),
            updated_at: Set(Utc::now().fixed_offset()),
        },
    )
    .await
    .expect("seed corrupt checkpoint");

    let job = CelestialJob::new(FakeChanges::default(), CelestialJobConfig::default());
    let result = SyncEngine::start(db, job, sync_config()).await;

    assert!(matches!(
        result,
        Err(SyncError::InvalidPosition { position: -5, .. })
    ));
}

#[tokio::test]
async fn test_run_stops_on_cancellation_and_returns_checkpoint() {
    let db = setup_test_db().await;
    let (_, bech32) = insert_address(db.as_ref(), 7).await;
    let cancel = CancellationToken::new();

    let source = FakeChanges {
        cancel_on_call: Some(cancel.clone()),
        ..FakeChanges::default()
    };
    source
        .pages
        .lock()
        .expect("pages")
        .push_back(vec![change("dave", &bech32, 11)]);

    let job = CelestialJob::new(source, CelestialJobConfig::default());
    let engine = SyncEngine::start(Arc::clone(&db), job, sync_config())
        .await
        .expect("start");

    let position = tokio::time::timeout(Duration::from_secs(10), engine.run(cancel))
        .await
        .expect("run returns after cancellation");

    // Cancellation fired during the first fetch, before its batch was applied
    assert_eq!(position, ChangeId(0));
    assert!(all_celestials(db.as_ref()).await.is_empty());
}
