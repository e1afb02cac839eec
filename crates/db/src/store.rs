use async_trait::async_trait;
use retaily_core::store::{ResultTable, StoreError, TabularStore};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::DbPool;

/// Tabular store over the retail dataset. Accepts arbitrary query strings
/// and returns stringified rows; the caller decides what to do with
/// failures (the workflow turns them into answer material).
pub struct RetailStore {
    pool: DbPool,
}

impl RetailStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TabularStore for RetailStore {
    async fn run_query(&self, sql: &str) -> Result<ResultTable, StoreError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(map_error)?;

        let Some(first) = rows.first() else {
            return Ok(ResultTable::default());
        };

        let columns =
            first.columns().iter().map(|column| column.name().to_string()).collect::<Vec<_>>();

        let mut rendered = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(render_value(row, index).map_err(map_error)?);
            }
            rendered.push(values);
        }

        Ok(ResultTable::new(columns, rendered))
    }
}

fn map_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(error.to_string())
        }
        _ => StoreError::Query(error.to_string()),
    }
}

/// Stringify one cell by its SQLite storage class. Queries are model
/// generated, so the projection's types are only known at runtime.
fn render_value(row: &SqliteRow, index: usize) -> Result<String, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok("NULL".to_string());
    }

    let type_name = raw.type_info().name().to_ascii_uppercase();
    let rendered = if type_name.contains("INT") {
        row.try_get::<i64, _>(index)?.to_string()
    } else if type_name.contains("REAL")
        || type_name.contains("FLOA")
        || type_name.contains("DOUB")
        || type_name.contains("NUMERIC")
    {
        row.try_get::<f64, _>(index)?.to_string()
    } else if type_name.contains("BLOB") {
        format!("<{} bytes>", row.try_get::<Vec<u8>, _>(index)?.len())
    } else if type_name.contains("BOOL") {
        row.try_get::<bool, _>(index)?.to_string()
    } else {
        row.try_get::<String, _>(index)?
    };

    Ok(rendered)
}
