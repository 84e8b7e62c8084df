//! Postgres repository implementation using Diesel.
//!
//! Ephemerides are stored as one `BYTEA` row per record with the horizon in
//! plain columns, so covering lookups are ordinary range predicates. Natural
//! keys are enforced with unique constraints; a concurrent writer that loses
//! the race gets [`RepositoryError::UniqueViolation`] back from
//! [`TransactionRepository::commit`].
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Connection health monitoring
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

use crate::codec::MaskKey;
use crate::db::coverage::{self, StoredInterval};
use crate::db::repository::*;
use crate::db::unit_of_work::{
    check_intervals, CommitReport, EphemerisRef, StagedEphemeris, StagedGroup, UnitOfWork,
};
use crate::models::{
    Eligibility, EligibilityGroup, EligibilityGroupId, EligibilityId, Ephemeris, EphemerisId,
    Satellite, SatelliteId, Station, StationId, TimeHorizon, VisibilityWindow,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Rows per multi-row insert, well under the Postgres bind parameter limit.
const INSERT_CHUNK: usize = 1000;

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables (see module docs).
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub connections_in_use: u32,
    pub idle_connections: u32,
    pub total_connections: u32,
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    pub failed_queries: u64,
    pub retried_operations: u64,
}

/// Diesel-backed cache repository.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        log::info!(
            "Postgres cache repository ready (pool max_size={})",
            config.max_pool_size
        );

        Ok(Self {
            pool,
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation on a blocking thread, retrying transient
    /// failures with exponential backoff.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        log::warn!("Retrying Postgres operation after: {}", e);
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Current pool state and query statistics.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }

    /// Returns `(is_healthy, latency_ms, error_message)`.
    pub async fn health_check_detailed(&self) -> (bool, Option<u64>, Option<String>) {
        let start = Instant::now();
        let elapsed = || Some(start.elapsed().as_millis() as u64);
        match self.health_check().await {
            Ok(true) => (true, elapsed(), None),
            Ok(false) => (
                false,
                elapsed(),
                Some("Health check returned false".to_string()),
            ),
            Err(e) => (false, elapsed(), Some(e.to_string())),
        }
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn offset_limit(offset: usize, limit: usize) -> (i64, i64) {
    (
        i64::try_from(offset).unwrap_or(i64::MAX),
        i64::try_from(limit).unwrap_or(i64::MAX),
    )
}

/// Bring a serial sequence past rows inserted with explicit ids.
fn resync_sequence(conn: &mut PgConnection, table: &str, column: &str) -> RepositoryResult<()> {
    sql_query(format!(
        "SELECT setval(pg_get_serial_sequence('{table}', '{column}'), \
         GREATEST((SELECT MAX({column}) FROM {table}), 1))"
    ))
    .execute(conn)
    .map_err(map_diesel_error)?;
    Ok(())
}

fn insert_staged_ephemeris(
    tx: &mut PgConnection,
    staged: &StagedEphemeris,
) -> RepositoryResult<EphemerisId> {
    let registered: bool = diesel::select(exists(
        satellites::table.find(staged.satellite_id.0),
    ))
    .get_result(tx)
    .map_err(map_diesel_error)?;
    if !registered {
        return Err(RepositoryError::validation_with_context(
            format!("Satellite {} is not registered", staged.satellite_id),
            ErrorContext::new("commit").with_entity("ephemeris"),
        ));
    }

    let id: i64 = diesel::insert_into(ephemerides::table)
        .values(NewEphemerisRow {
            satellite_id: staged.satellite_id.0,
            start_time: staged.horizon.start(),
            end_time: staged.horizon.end(),
            step_ms: staged.horizon.step_ms(),
            data: &staged.data,
        })
        .returning(ephemerides::ephemeris_id)
        .get_result(tx)
        .map_err(map_diesel_error)?;
    Ok(EphemerisId(id))
}

fn insert_staged_group(
    tx: &mut PgConnection,
    staged: StagedGroup,
    staged_ephemerides: &[StagedEphemeris],
    report: &CommitReport,
) -> RepositoryResult<EligibilityGroupId> {
    let context = || {
        ErrorContext::new("commit")
            .with_entity("eligibility_group")
            .with_details(format!("station_id={}", staged.station_id))
    };

    let resolved = match staged.ephemeris {
        EphemerisRef::Stored(id) => ephemerides::table
            .find(id.0)
            .select(EphemerisRow::as_select())
            .first::<EphemerisRow>(tx)
            .optional()
            .map_err(map_diesel_error)?
            .map(|row| row.horizon().map(|h| (id, h)))
            .transpose()?,
        EphemerisRef::Staged(index) => report
            .ephemeris_ids
            .get(index)
            .zip(staged_ephemerides.get(index))
            .map(|(id, e)| (*id, e.horizon)),
    };
    let (ephemeris_id, horizon) = resolved.ok_or_else(|| {
        RepositoryError::validation_with_context(
            format!("group references unknown ephemeris {:?}", staged.ephemeris),
            context(),
        )
    })?;

    let station_known: bool = diesel::select(exists(stations::table.find(staged.station_id.0)))
        .get_result(tx)
        .map_err(map_diesel_error)?;
    if !station_known {
        return Err(RepositoryError::validation_with_context(
            format!("Station {} is not registered", staged.station_id),
            context(),
        ));
    }
    check_intervals(&horizon, &staged.intervals)
        .map_err(|message| RepositoryError::validation_with_context(message, context()))?;

    let group_id: i64 = diesel::insert_into(eligibility_groups::table)
        .values(NewGroupRow {
            ephemeris_id: ephemeris_id.0,
            station_id: staged.station_id.0,
            mask: staged.mask.into_bytes(),
            step_ms: staged.step_ms,
            backend: staged.backend,
        })
        .returning(eligibility_groups::group_id)
        .get_result(tx)
        .map_err(map_diesel_error)?;

    let rows: Vec<NewIntervalRow> = staged
        .intervals
        .iter()
        .map(|w| NewIntervalRow {
            group_id,
            start_time: w.start,
            end_time: w.end,
        })
        .collect();
    for chunk in rows.chunks(INSERT_CHUNK) {
        diesel::insert_into(eligibilities::table)
            .values(chunk)
            .execute(tx)
            .map_err(map_diesel_error)?;
    }

    Ok(EligibilityGroupId(group_id))
}

/// Intervals of the given groups, keyed by group and ordered by id.
fn load_intervals(
    conn: &mut PgConnection,
    group_ids: Vec<i64>,
) -> RepositoryResult<HashMap<i64, Vec<IntervalRow>>> {
    let rows = eligibilities::table
        .filter(eligibilities::group_id.eq_any(group_ids))
        .order(eligibilities::eligibility_id.asc())
        .select(IntervalRow::as_select())
        .load::<IntervalRow>(conn)
        .map_err(map_diesel_error)?;

    let mut by_group: HashMap<i64, Vec<IntervalRow>> = HashMap::new();
    for row in rows {
        by_group.entry(row.group_id).or_default().push(row);
    }
    Ok(by_group)
}

fn group_to_model(row: GroupRow, intervals: &[IntervalRow]) -> EligibilityGroup {
    EligibilityGroup {
        id: EligibilityGroupId(row.group_id),
        ephemeris_id: EphemerisId(row.ephemeris_id),
        station_id: StationId(row.station_id),
        mask: MaskKey::from_bytes(row.mask),
        step_ms: row.step_ms,
        backend: row.backend,
        intervals: intervals
            .iter()
            .map(|iv| VisibilityWindow::new(iv.start_time, iv.end_time))
            .collect(),
    }
}

#[async_trait]
impl TransactionRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn commit(&self, unit: UnitOfWork) -> RepositoryResult<CommitReport> {
        if unit.is_empty() {
            return Ok(CommitReport::default());
        }

        self.with_conn(move |conn| {
            let (staged_ephemerides, staged_groups) = unit.into_parts();
            conn.transaction(|tx| {
                let mut report = CommitReport::default();
                for staged in &staged_ephemerides {
                    report
                        .ephemeris_ids
                        .push(insert_staged_ephemeris(tx, staged)?);
                }
                for staged in staged_groups {
                    let id = insert_staged_group(tx, staged, &staged_ephemerides, &report)?;
                    report.group_ids.push(id);
                }
                Ok(report)
            })
        })
        .await
    }
}

#[async_trait]
impl EphemerisRepository for PostgresRepository {
    async fn extract_ephemeris(
        &self,
        satellite_id: SatelliteId,
        horizon: &TimeHorizon,
        shrink: bool,
    ) -> RepositoryResult<Option<Ephemeris>> {
        let horizon = *horizon;
        self.with_conn(move |conn| {
            let row = ephemerides::table
                .filter(ephemerides::satellite_id.eq(satellite_id.0))
                .filter(ephemerides::step_ms.eq(horizon.step_ms()))
                .filter(ephemerides::start_time.le(horizon.start()))
                .filter(ephemerides::end_time.ge(horizon.end()))
                .order(ephemerides::ephemeris_id.asc())
                .select(EphemerisRow::as_select())
                .first::<EphemerisRow>(conn)
                .optional()
                .map_err(map_diesel_error)?;

            match row {
                Some(row) => {
                    let record = row.into_stored()?;
                    coverage::materialize_ephemeris(&record, &horizon, shrink).map(Some)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn load_ephemeris(&self, id: EphemerisId) -> RepositoryResult<Ephemeris> {
        self.with_conn(move |conn| {
            let record = ephemerides::table
                .find(id.0)
                .select(EphemerisRow::as_select())
                .first::<EphemerisRow>(conn)
                .map_err(|e| map_diesel_error(e).with_operation("load_ephemeris"))?
                .into_stored()?;
            coverage::materialize_ephemeris(&record, &record.horizon, false)
        })
        .await
    }

    async fn list_horizons(&self, satellite_id: SatelliteId) -> RepositoryResult<Vec<TimeHorizon>> {
        self.with_conn(move |conn| {
            let rows: Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>, i64)> =
                ephemerides::table
                    .filter(ephemerides::satellite_id.eq(satellite_id.0))
                    .select((
                        ephemerides::start_time,
                        ephemerides::end_time,
                        ephemerides::step_ms,
                    ))
                    .distinct()
                    .order((
                        ephemerides::start_time.asc(),
                        ephemerides::end_time.asc(),
                        ephemerides::step_ms.asc(),
                    ))
                    .load(conn)
                    .map_err(map_diesel_error)?;

            rows.into_iter()
                .map(|(start, end, step_ms)| {
                    TimeHorizon::from_millis(start, end, step_ms).map_err(|e| {
                        RepositoryError::corrupt(
                            e.to_string(),
                            ErrorContext::new("list_horizons")
                                .with_entity("ephemeris")
                                .with_details(format!("satellite_id={}", satellite_id)),
                        )
                    })
                })
                .collect()
        })
        .await
    }
}

#[async_trait]
impl EligibilityRepository for PostgresRepository {
    async fn extract_eligibilities(
        &self,
        query: &EligibilityQuery,
    ) -> RepositoryResult<EligibilityLookup> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let satellite_ids: Vec<i64> = query.satellites.iter().map(|s| s.0).collect();
            let station_ids: Vec<i64> = query.station_masks.keys().map(|s| s.0).collect();

            let candidates: Vec<(GroupRow, i64)> = eligibility_groups::table
                .inner_join(ephemerides::table)
                .filter(ephemerides::satellite_id.eq_any(satellite_ids))
                .filter(ephemerides::step_ms.eq(query.horizon.step_ms()))
                .filter(ephemerides::start_time.le(query.horizon.start()))
                .filter(ephemerides::end_time.ge(query.horizon.end()))
                .filter(eligibility_groups::station_id.eq_any(station_ids))
                .filter(eligibility_groups::step_ms.eq(query.interpolation_step_ms()))
                .filter(eligibility_groups::backend.eq(&query.backend))
                .order(eligibility_groups::group_id.asc())
                .select((GroupRow::as_select(), ephemerides::satellite_id))
                .load::<(GroupRow, i64)>(conn)
                .map_err(map_diesel_error)?;

            // Masks are matched here rather than in SQL: the first candidate
            // per pair in id order wins.
            let mut chosen: BTreeMap<(SatelliteId, StationId), i64> = BTreeMap::new();
            for (group, satellite_id) in &candidates {
                let station_id = StationId(group.station_id);
                let wanted = query.station_masks.get(&station_id);
                if wanted.map(|m| m.as_bytes()) != Some(group.mask.as_slice()) {
                    continue;
                }
                chosen
                    .entry((SatelliteId(*satellite_id), station_id))
                    .or_insert(group.group_id);
            }

            let intervals = load_intervals(conn, chosen.values().copied().collect())?;

            let mut lookup: EligibilityLookup = query.pairs().map(|pair| (pair, None)).collect();
            for ((satellite_id, station_id), group_id) in chosen {
                let stored: Vec<StoredInterval> = intervals
                    .get(&group_id)
                    .map(|rows| rows.iter().map(StoredInterval::from).collect())
                    .unwrap_or_default();
                lookup.insert(
                    (satellite_id, station_id),
                    Some(coverage::select_intervals(
                        satellite_id,
                        station_id,
                        &stored,
                        &query.horizon,
                        query.shrink,
                    )),
                );
            }
            Ok(lookup)
        })
        .await
    }

    async fn load_group(&self, id: EligibilityGroupId) -> RepositoryResult<EligibilityGroup> {
        self.with_conn(move |conn| {
            let row = eligibility_groups::table
                .find(id.0)
                .select(GroupRow::as_select())
                .first::<GroupRow>(conn)
                .map_err(|e| map_diesel_error(e).with_operation("load_group"))?;
            let intervals = load_intervals(conn, vec![row.group_id])?;
            let rows = intervals.get(&row.group_id).cloned().unwrap_or_default();
            Ok(group_to_model(row, &rows))
        })
        .await
    }

    async fn list_groups(&self, satellite_id: SatelliteId) -> RepositoryResult<Vec<EligibilityGroup>> {
        self.with_conn(move |conn| {
            let groups: Vec<GroupRow> = eligibility_groups::table
                .inner_join(ephemerides::table)
                .filter(ephemerides::satellite_id.eq(satellite_id.0))
                .order(eligibility_groups::group_id.asc())
                .select(GroupRow::as_select())
                .load(conn)
                .map_err(map_diesel_error)?;
            let intervals = load_intervals(conn, groups.iter().map(|g| g.group_id).collect())?;
            Ok(groups
                .into_iter()
                .map(|g| {
                    let rows = intervals.get(&g.group_id).map(Vec::as_slice).unwrap_or(&[]);
                    group_to_model(g, rows)
                })
                .collect())
        })
        .await
    }
}

#[async_trait]
impl EntityRegistry<Satellite> for PostgresRepository {
    async fn load(&self, id: SatelliteId) -> RepositoryResult<Option<Satellite>> {
        self.with_conn(move |conn| {
            satellites::table
                .find(id.0)
                .select(SatelliteRow::as_select())
                .first::<SatelliteRow>(conn)
                .optional()
                .map(|row| row.map(Satellite::from))
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn store(&self, entity: &Satellite) -> RepositoryResult<Satellite> {
        let entity = entity.clone();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let row: SatelliteRow = match entity.id {
                    Some(id) => {
                        let row = diesel::insert_into(satellites::table)
                            .values(SatelliteRow::with_id(id, &entity))
                            .returning(SatelliteRow::as_returning())
                            .get_result(tx)
                            .map_err(map_diesel_error)?;
                        resync_sequence(tx, "satellites", "satellite_id")?;
                        row
                    }
                    None => diesel::insert_into(satellites::table)
                        .values(NewSatelliteRow::from(&entity))
                        .returning(SatelliteRow::as_returning())
                        .get_result(tx)
                        .map_err(map_diesel_error)?,
                };
                Ok(Satellite::from(row))
            })
        })
        .await
    }

    async fn delete(&self, id: SatelliteId) -> RepositoryResult<bool> {
        self.with_conn(move |conn| {
            diesel::delete(satellites::table.find(id.0))
                .execute(conn)
                .map(|n| n > 0)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Satellite>> {
        let (offset, limit) = offset_limit(offset, limit);
        self.with_conn(move |conn| {
            satellites::table
                .order(satellites::satellite_id.asc())
                .offset(offset)
                .limit(limit)
                .select(SatelliteRow::as_select())
                .load::<SatelliteRow>(conn)
                .map(|rows| rows.into_iter().map(Satellite::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }
}

#[async_trait]
impl EntityRegistry<Station> for PostgresRepository {
    async fn load(&self, id: StationId) -> RepositoryResult<Option<Station>> {
        self.with_conn(move |conn| {
            stations::table
                .find(id.0)
                .select(StationRow::as_select())
                .first::<StationRow>(conn)
                .optional()
                .map(|row| row.map(Station::from))
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn store(&self, entity: &Station) -> RepositoryResult<Station> {
        let entity = entity.clone();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let row: StationRow = match entity.id {
                    Some(id) => {
                        let row = diesel::insert_into(stations::table)
                            .values(StationRow::with_id(id, &entity))
                            .returning(StationRow::as_returning())
                            .get_result(tx)
                            .map_err(map_diesel_error)?;
                        resync_sequence(tx, "stations", "station_id")?;
                        row
                    }
                    None => diesel::insert_into(stations::table)
                        .values(NewStationRow::from(&entity))
                        .returning(StationRow::as_returning())
                        .get_result(tx)
                        .map_err(map_diesel_error)?,
                };
                Ok(Station::from(row))
            })
        })
        .await
    }

    async fn delete(&self, id: StationId) -> RepositoryResult<bool> {
        self.with_conn(move |conn| {
            diesel::delete(stations::table.find(id.0))
                .execute(conn)
                .map(|n| n > 0)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Station>> {
        let (offset, limit) = offset_limit(offset, limit);
        self.with_conn(move |conn| {
            stations::table
                .order(stations::station_id.asc())
                .offset(offset)
                .limit(limit)
                .select(StationRow::as_select())
                .load::<StationRow>(conn)
                .map(|rows| rows.into_iter().map(Station::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }
}

type EligibilityJoinRow = (IntervalRow, i64, i64);

fn eligibility_from_join((row, satellite_id, station_id): EligibilityJoinRow) -> Eligibility {
    Eligibility {
        id: Some(EligibilityId(row.eligibility_id)),
        satellite_id: SatelliteId(satellite_id),
        station_id: StationId(station_id),
        start: row.start_time,
        end: row.end_time,
    }
}

#[async_trait]
impl EntityRegistry<Eligibility> for PostgresRepository {
    async fn load(&self, id: EligibilityId) -> RepositoryResult<Option<Eligibility>> {
        self.with_conn(move |conn| {
            eligibilities::table
                .inner_join(eligibility_groups::table.inner_join(ephemerides::table))
                .filter(eligibilities::eligibility_id.eq(id.0))
                .select((
                    IntervalRow::as_select(),
                    ephemerides::satellite_id,
                    eligibility_groups::station_id,
                ))
                .first::<EligibilityJoinRow>(conn)
                .optional()
                .map(|row| row.map(eligibility_from_join))
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn store(&self, _entity: &Eligibility) -> RepositoryResult<Eligibility> {
        Err(RepositoryError::unsupported(
            "eligibilities cannot be stored individually, stage a group instead",
            ErrorContext::new("store").with_entity("eligibility"),
        ))
    }

    async fn delete(&self, id: EligibilityId) -> RepositoryResult<bool> {
        self.with_conn(move |conn| {
            diesel::delete(eligibilities::table.find(id.0))
                .execute(conn)
                .map(|n| n > 0)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Eligibility>> {
        let (offset, limit) = offset_limit(offset, limit);
        self.with_conn(move |conn| {
            eligibilities::table
                .inner_join(eligibility_groups::table.inner_join(ephemerides::table))
                .order(eligibilities::eligibility_id.asc())
                .offset(offset)
                .limit(limit)
                .select((
                    IntervalRow::as_select(),
                    ephemerides::satellite_id,
                    eligibility_groups::station_id,
                ))
                .load::<EligibilityJoinRow>(conn)
                .map(|rows| rows.into_iter().map(eligibility_from_join).collect())
                .map_err(map_diesel_error)
        })
        .await
    }
}
