//! Shared helpers for backend integration tests.
//!
//! Integration tests compile as separate crates, so the fakes they share live
//! here and each test file pulls them in with `mod support;`.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use click_recorder::domain::ports::{
    DatabaseRole, EventPool, EventPoolError, PoolFactory, PoolProfile, PoolTarget, TlsMode,
};
use click_recorder::domain::{ClickEventRow, EventOrder, NewClickEvent};

pub mod pg_embed;

/// Whether `SKIP_TEST_CLUSTER` asks for embedded-cluster tests to be skipped.
///
/// Truthy values: "1", "true", "yes" (case-insensitive).
pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Skip with a marker when `SKIP_TEST_CLUSTER` is set, otherwise fail loudly.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

/// A target that never resolves; fakes ignore it.
pub fn fake_target() -> PoolTarget {
    PoolTarget {
        hostname: "cluster.dsql.us-east-1.on.aws".to_owned(),
        port: 5432,
        database: "postgres".to_owned(),
        region: "us-east-1".to_owned(),
        role: DatabaseRole::Admin,
        tls: TlsMode::Require,
    }
}

/// Scripted answers for a [`FakeEventPool`].
#[derive(Clone, Debug, Default)]
pub struct FakeBehaviour {
    pub ping: Option<EventPoolError>,
    pub list: Option<EventPoolError>,
}

/// In-memory event pool with call counters.
#[derive(Debug, Default)]
pub struct FakeEventPool {
    behaviour: FakeBehaviour,
    rows: Mutex<Vec<ClickEventRow>>,
    pub inserts: AtomicUsize,
    pub closes: AtomicUsize,
}

impl FakeEventPool {
    pub fn new(behaviour: FakeBehaviour) -> Self {
        Self {
            behaviour,
            ..Self::default()
        }
    }

    fn result(err: &Option<EventPoolError>) -> Result<(), EventPoolError> {
        match err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventPool for FakeEventPool {
    async fn ping(&self) -> Result<(), EventPoolError> {
        Self::result(&self.behaviour.ping)
    }

    async fn server_version(&self) -> Result<String, EventPoolError> {
        Ok("PostgreSQL 16.0 (fake)".to_owned())
    }

    async fn ensure_schema(&self) -> Result<(), EventPoolError> {
        Ok(())
    }

    async fn count_events(&self) -> Result<i64, EventPoolError> {
        let rows = self.rows.lock().expect("rows lock");
        Ok(i64::try_from(rows.len()).expect("row count fits i64"))
    }

    async fn insert_events(&self, events: &[NewClickEvent]) -> Result<(), EventPoolError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().expect("rows lock");
        rows.extend(events.iter().map(|event| ClickEventRow {
            id: event.id.get(),
            timestamp: None,
            action: Some(event.action.clone()),
            user_agent: Some(event.user_agent.clone()),
            ip_address: Some(event.ip_address.clone()),
            created_at: None,
        }));
        Ok(())
    }

    async fn list_events(&self, order: EventOrder) -> Result<Vec<ClickEventRow>, EventPoolError> {
        Self::result(&self.behaviour.list)?;
        let mut rows = self.rows.lock().expect("rows lock").clone();
        match order {
            EventOrder::ById => rows.sort_by_key(|row| row.id),
            EventOrder::NewestFirst => rows.sort_by_key(|row| std::cmp::Reverse(row.id)),
        }
        Ok(rows)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out a fresh [`FakeEventPool`] per build.
///
/// Successive builds take their behaviour from `script`; once exhausted the
/// last entry repeats.
pub struct FakePoolFactory {
    script: Vec<FakeBehaviour>,
    built: Mutex<Vec<Arc<FakeEventPool>>>,
}

impl FakePoolFactory {
    pub fn new(script: Vec<FakeBehaviour>) -> Self {
        Self {
            script,
            built: Mutex::new(Vec::new()),
        }
    }

    pub fn builds(&self) -> usize {
        self.built.lock().expect("built lock").len()
    }

    pub fn pool(&self, index: usize) -> Arc<FakeEventPool> {
        Arc::clone(&self.built.lock().expect("built lock")[index])
    }
}

#[async_trait]
impl PoolFactory for FakePoolFactory {
    async fn build(
        &self,
        _target: &PoolTarget,
        _profile: &PoolProfile,
    ) -> Result<Arc<dyn EventPool>, EventPoolError> {
        let mut built = self.built.lock().expect("built lock");
        let behaviour = self
            .script
            .get(built.len())
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_default();
        let pool = Arc::new(FakeEventPool::new(behaviour));
        built.push(Arc::clone(&pool));
        Ok(pool)
    }
}
