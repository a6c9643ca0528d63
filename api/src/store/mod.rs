//! Sole writer to persistence. All operations are typed, and
//! failures are classified into the `CoreError` taxonomy — callers never see
//! a raw `diesel::result::Error`.

pub mod analytics;
pub mod articles;
pub mod email;
pub mod jobs;
pub mod sources;

use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub use analytics::{AnalyticsSnapshot, EntityMention, SentimentBucket, TrendingTopic, ViewRefreshResult};
pub use articles::{ArticleFilter, ArticleRef, ArticleSort, ArticleStats, Page, SortDir, SortField, UpsertOutcome};

pub type PgPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Cheap liveness check used by the health registry: a connection can be
    /// checked out and a trivial query executes.
    pub async fn ping(&self) -> Result<(), crate::error::CoreError> {
        use diesel_async::RunQueryDsl;
        let mut conn = self.pool.get().await?;
        diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
            .get_result::<i32>(&mut conn)
            .await?;
        Ok(())
    }

    pub fn connect(database_url: &str) -> Result<PgPool, Box<dyn std::error::Error + Send + Sync>> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager).max_size(16).build()?;
        Ok(pool)
    }
}
