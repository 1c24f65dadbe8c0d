use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::store::validate_commit;
use crate::{
    CollectionPath, Commit, Direction, Document, DocumentPath, DocumentStore, DocumentStream, Query,
    Result, StoreError, Version, Write,
};

/// SQLSTATE for serialization failures under SERIALIZABLE isolation.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed document store.
///
/// Every document is one row of the `documents` table with a JSONB body and
/// a version counter. Commits run in a SERIALIZABLE transaction.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let path: String = row.try_get("path")?;
        Ok(Document {
            path: path.parse()?,
            version: Version::new(row.try_get("version")?),
            data: row.try_get("data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn apply_write(tx: &mut sqlx::Transaction<'_, Postgres>, write: &Write) -> Result<()> {
        match write {
            Write::Set { path, data } => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (path, collection, doc_id, data, version)
                    VALUES ($1, $2, $3, $4, 1)
                    ON CONFLICT (path) DO UPDATE SET
                        data = EXCLUDED.data,
                        version = documents.version + 1,
                        updated_at = now()
                    "#,
                )
                .bind(path.to_string())
                .bind(path.collection().as_str())
                .bind(path.id())
                .bind(data)
                .execute(&mut **tx)
                .await?;
            }
            Write::Merge { path, data } => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (path, collection, doc_id, data, version)
                    VALUES ($1, $2, $3, $4, 1)
                    ON CONFLICT (path) DO UPDATE SET
                        data = documents.data || EXCLUDED.data,
                        version = documents.version + 1,
                        updated_at = now()
                    "#,
                )
                .bind(path.to_string())
                .bind(path.collection().as_str())
                .bind(path.id())
                .bind(data)
                .execute(&mut **tx)
                .await?;
            }
            Write::Update { path, data } => {
                let result = sqlx::query(
                    r#"
                    UPDATE documents
                    SET data = data || $2, version = version + 1, updated_at = now()
                    WHERE path = $1
                    "#,
                )
                .bind(path.to_string())
                .bind(data)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound(path.clone()));
                }
            }
            Write::Delete { path } => {
                sqlx::query("DELETE FROM documents WHERE path = $1")
                    .bind(path.to_string())
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Maps serialization failures and racing inserts to a retryable conflict.
fn classify(err: sqlx::Error, path: &DocumentPath) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(UNIQUE_VIOLATION)
        )
    {
        return StoreError::Conflict {
            path: path.clone(),
            expected: None,
            actual: None,
        };
    }
    StoreError::Database(err)
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT path, data, version, created_at, updated_at
            FROM documents
            WHERE path = $1
            "#,
        )
        .bind(path.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let mut sql = String::from(
            "SELECT path, data, version, created_at, updated_at FROM documents WHERE collection = $1",
        );
        let mut param_count = 1;

        // Equality filters become one containment check
        let mut containment = serde_json::Map::new();
        for filter in &query.filters {
            containment.insert(filter.field.clone(), filter.value.clone());
        }
        if !containment.is_empty() {
            param_count += 1;
            sql.push_str(&format!(" AND data @> ${param_count}"));
        }

        if let Some(order) = &query.order_by {
            param_count += 1;
            let field_param = param_count;
            sql.push_str(&format!(" AND data ? ${field_param}"));

            if let Some(cursor) = &query.start_after {
                param_count += 1;
                let value_param = param_count;
                let op = match order.direction {
                    Direction::Ascending => ">",
                    Direction::Descending => "<",
                };
                if cursor.id.is_some() {
                    param_count += 1;
                    sql.push_str(&format!(
                        " AND (data -> ${field_param} {op} ${value_param} \
                         OR (data -> ${field_param} = ${value_param} AND doc_id > ${param_count}))"
                    ));
                } else {
                    sql.push_str(&format!(" AND data -> ${field_param} {op} ${value_param}"));
                }
            }

            let dir = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY data -> ${field_param} {dir}, doc_id ASC"));
        } else {
            sql.push_str(" ORDER BY path ASC");
        }

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql).bind(query.collection.as_str());
        if !containment.is_empty() {
            sqlx_query = sqlx_query.bind(serde_json::Value::Object(containment));
        }
        if let Some(order) = &query.order_by {
            sqlx_query = sqlx_query.bind(order.field.clone());
            if let Some(cursor) = &query.start_after {
                sqlx_query = sqlx_query.bind(cursor.value.clone());
                if let Some(id) = &cursor.id {
                    sqlx_query = sqlx_query.bind(id.clone());
                }
            }
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn stream_collection(&self, collection: &CollectionPath) -> Result<DocumentStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT path, data, version, created_at, updated_at
            FROM documents
            WHERE collection = $1
            ORDER BY path ASC
            "#,
        )
        .bind(collection.as_str().to_string())
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_document(row),
            Err(e) => Err(StoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        validate_commit(&commit)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        for pre in &commit.preconditions {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM documents WHERE path = $1 FOR UPDATE")
                    .bind(pre.path.to_string())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| classify(e, &pre.path))?;

            let actual = actual.map(Version::new);
            if actual != pre.expected {
                return Err(StoreError::Conflict {
                    path: pre.path.clone(),
                    expected: pre.expected,
                    actual,
                });
            }
        }

        for write in &commit.writes {
            match Self::apply_write(&mut tx, write).await {
                Ok(()) => {}
                Err(StoreError::Database(e)) => return Err(classify(e, write.path())),
                Err(e) => return Err(e),
            }
        }

        let last = commit.writes.last().map(|w| w.path().clone());
        tx.commit().await.map_err(|e| match &last {
            Some(path) => classify(e, path),
            None => StoreError::Database(e),
        })?;
        Ok(())
    }
}
