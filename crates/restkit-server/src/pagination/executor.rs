use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool};

use super::FilteredQuery;

/// Runs [`FilteredQuery`] pages and counts against a data source
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    type Row: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Rows of the current page
    async fn fetch(&self, query: &FilteredQuery) -> Result<Vec<Self::Row>, Self::Error>;

    /// Size of the whole filtered set
    async fn count(&self, query: &FilteredQuery) -> Result<i64, Self::Error>;
}

/// Postgres executor mapping rows into `T`
pub struct PgExecutor<T> {
    pool: PgPool,
    _row: PhantomData<fn() -> T>,
}

impl<T> PgExecutor<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _row: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl<T> Clone for PgExecutor<T> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[async_trait]
impl<T> QueryExecutor for PgExecutor<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
{
    type Row = T;
    type Error = sqlx::Error;

    async fn fetch(&self, query: &FilteredQuery) -> Result<Vec<T>, sqlx::Error> {
        let mut builder = query.select_sql();
        builder.build_query_as::<T>().fetch_all(&self.pool).await
    }

    async fn count(&self, query: &FilteredQuery) -> Result<i64, sqlx::Error> {
        let mut builder = query.count_sql();
        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
    }
}
