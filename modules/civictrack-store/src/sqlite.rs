//! SQLite-backed Issue and User store.
//!
//! Flag mutations are the only multi-statement writes. They run in one
//! transaction whose first statement is a write, so SQLite takes the write lock
//! up front and concurrent flaggers queue on the busy timeout instead of
//! interleaving.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use civictrack_common::{
    Category, FlagOutcome, Issue, IssueFilter, IssueId, IssueStatus, NewFlag, NewIssue, NewUser,
    User, UserId,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{IssueStore, UserStore};

const ISSUE_SELECT: &str = r#"
    SELECT i.id, i.title, i.description, i.category, i.status,
           i.latitude, i.longitude, i.address,
           i.reporter_id, u.username AS reporter_username, i.is_anonymous,
           i.flag_count, i.is_flagged, i.created_at, i.updated_at
    FROM issues i
    LEFT JOIN users u ON u.id = i.reporter_id
"#;

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
const IMAGE_LOOKUP_CHUNK: usize = 500;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: i64,
    title: String,
    description: String,
    category: String,
    status: String,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    reporter_id: Option<i64>,
    reporter_username: Option<String>,
    is_anonymous: bool,
    flag_count: i64,
    is_flagged: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IssueRow {
    fn into_issue(self, images: Vec<String>) -> StoreResult<Issue> {
        let category = self
            .category
            .parse::<Category>()
            .map_err(|e| StoreError::Corrupt(format!("issue {}: {e}", self.id)))?;
        let status = self
            .status
            .parse::<IssueStatus>()
            .map_err(|e| StoreError::Corrupt(format!("issue {}: {e}", self.id)))?;

        Ok(Issue {
            id: self.id,
            title: self.title,
            description: self.description,
            category,
            status,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            reporter_id: self.reporter_id,
            reporter_username: self.reporter_username,
            is_anonymous: self.is_anonymous,
            images,
            flag_count: self.flag_count,
            is_flagged: self.is_flagged,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    username: Option<String>,
    is_banned: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            username: row.username,
            is_banned: row.is_banned,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Single source of truth for issues, images, flags and users.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply migrations.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        Self::connect_with(options, 8).await
    }

    pub async fn connect_with(options: SqliteConnectOptions, max_connections: u32) -> StoreResult<Self> {
        let options = options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database on a single pinned connection. The
    /// connection must never be recycled or the database disappears with it.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn attach_images(&self, rows: Vec<IssueRow>) -> StoreResult<Vec<Issue>> {
        let ids: Vec<IssueId> = rows.iter().map(|r| r.id).collect();
        let mut images = self.images_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let files = images.remove(&row.id).unwrap_or_default();
                row.into_issue(files)
            })
            .collect()
    }

    async fn images_for(&self, ids: &[IssueId]) -> StoreResult<HashMap<IssueId, Vec<String>>> {
        let mut images: HashMap<IssueId, Vec<String>> = HashMap::new();

        for chunk in ids.chunks(IMAGE_LOOKUP_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT issue_id, filename FROM issue_images WHERE issue_id IN (",
            );
            {
                let mut separated = qb.separated(", ");
                for id in chunk {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(") ORDER BY id ASC");
            }

            let rows = qb
                .build_query_as::<(i64, String)>()
                .fetch_all(&self.pool)
                .await?;

            for (issue_id, filename) in rows {
                images.entry(issue_id).or_default().push(filename);
            }
        }

        Ok(images)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl IssueStore for SqliteStore {
    async fn create_issue(&self, issue: &NewIssue) -> StoreResult<IssueId> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO issues (
                title, description, category, status, latitude, longitude,
                address, reporter_id, is_anonymous, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(issue.category.as_str())
        .bind(IssueStatus::Reported.as_str())
        .bind(issue.latitude)
        .bind(issue.longitude)
        .bind(&issue.address)
        .bind(issue.reporter_id)
        .bind(issue.is_anonymous)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn add_image(&self, issue_id: IssueId, filename: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO issue_images (issue_id, filename, created_at) VALUES (?, ?, ?)")
            .bind(issue_id)
            .bind(filename)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::IssueNotFound(issue_id)
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    async fn get_by_id(&self, id: IssueId) -> StoreResult<Issue> {
        let sql = format!("{ISSUE_SELECT} WHERE i.id = ?");
        let row = sqlx::query_as::<_, IssueRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::IssueNotFound(id))?;

        let mut issues = self.attach_images(vec![row]).await?;
        issues.pop().ok_or(StoreError::IssueNotFound(id))
    }

    async fn list_candidates(&self, filter: IssueFilter) -> StoreResult<Vec<Issue>> {
        let mut qb = QueryBuilder::<Sqlite>::new(ISSUE_SELECT);
        qb.push(" WHERE i.is_flagged = 0");
        if let Some(category) = filter.category {
            qb.push(" AND i.category = ").push_bind(category.as_str());
        }
        if let Some(status) = filter.status {
            qb.push(" AND i.status = ").push_bind(status.as_str());
        }

        let rows = qb.build_query_as::<IssueRow>().fetch_all(&self.pool).await?;
        debug!(candidates = rows.len(), ?filter, "Loaded nearby candidates");
        self.attach_images(rows).await
    }

    async fn list_flagged(&self) -> StoreResult<Vec<Issue>> {
        let sql = format!(
            "{ISSUE_SELECT} WHERE i.is_flagged = 1 ORDER BY i.flag_count DESC, i.updated_at DESC, i.id DESC"
        );
        let rows = sqlx::query_as::<_, IssueRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        self.attach_images(rows).await
    }

    async fn set_status(&self, id: IssueId, status: IssueStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE issues SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::IssueNotFound(id));
        }
        Ok(())
    }

    async fn increment_flag(&self, id: IssueId) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE issues SET flag_count = flag_count + 1, updated_at = ? WHERE id = ? RETURNING flag_count",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::IssueNotFound(id))
    }

    async fn set_flagged(&self, id: IssueId, flagged: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE issues SET is_flagged = ?, updated_at = ? WHERE id = ?")
            .bind(flagged)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::IssueNotFound(id));
        }
        Ok(())
    }

    async fn reset_flags(&self, id: IssueId) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE issues SET flag_count = 0, is_flagged = 0, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::IssueNotFound(id));
        }

        let deleted = sqlx::query("DELETE FROM issue_flags WHERE issue_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected())
    }

    async fn record_flag(&self, flag: &NewFlag, hide_threshold: i64) -> StoreResult<FlagOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Touch the row first: it takes the write lock, tells us whether the
        // issue exists, and hands back the counter state before this flag.
        let prior = sqlx::query_as::<_, (i64, i64)>(
            "UPDATE issues SET updated_at = ? WHERE id = ? RETURNING flag_count, is_flagged",
        )
        .bind(now)
        .bind(flag.issue_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((prior_count, prior_flagged)) = prior else {
            tx.rollback().await?;
            return Err(StoreError::IssueNotFound(flag.issue_id));
        };

        let was_flagged = prior_flagged != 0;
        let flag_count = prior_count + 1;
        let is_flagged = was_flagged || flag_count >= hide_threshold;

        sqlx::query("UPDATE issues SET flag_count = ?, is_flagged = ? WHERE id = ?")
            .bind(flag_count)
            .bind(is_flagged)
            .bind(flag.issue_id)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO issue_flags (issue_id, user_id, reason, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(flag.issue_id)
        .bind(flag.user_id)
        .bind(&flag.reason)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            tx.rollback().await?;
            return Err(if is_unique_violation(&e) {
                StoreError::AlreadyFlagged {
                    issue_id: flag.issue_id,
                    user_id: flag.user_id,
                }
            } else if is_foreign_key_violation(&e) {
                StoreError::UserNotFound(flag.user_id)
            } else {
                e.into()
            });
        }

        tx.commit().await?;
        Ok(FlagOutcome {
            flag_count,
            is_flagged,
            was_flagged,
        })
    }

    async fn count_issues(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM issues")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn issue_counts_by_category(&self) -> StoreResult<Vec<(Category, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT category, COUNT(*) FROM issues GROUP BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(raw, count)| {
                raw.parse::<Category>()
                    .map(|c| (c, count))
                    .map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }

    async fn issue_counts_by_status(&self) -> StoreResult<Vec<(IssueStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM issues GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(raw, count)| {
                raw.parse::<IssueStatus>()
                    .map(|s| (s, count))
                    .map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<UserId> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (email, username, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, username, is_banned, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn set_banned(&self, id: UserId, banned: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET is_banned = ? WHERE id = ?")
            .bind(banned)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(id));
        }
        Ok(())
    }

    async fn count_users(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
