use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CounterDocument, CounterLabels, Dimension, SubmissionRecord};
use crate::store::DocumentStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Counter collections map onto identically shaped tables keyed by the
/// dimension value.
fn counter_table(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Country => "valentine_leads.valentine_chart",
        Dimension::University => "valentine_leads.university_cache",
    }
}

fn to_count(dimension: Dimension, key: &str, count: i64) -> Result<u64, StoreError> {
    u64::try_from(count).map_err(|_| StoreError::Corrupt {
        collection: dimension.collection(),
        key: key.to_string(),
        reason: format!("negative count {count}"),
    })
}

fn counter_from_row(dimension: Dimension, row: &PgRow) -> Result<CounterDocument, StoreError> {
    let key: String = row.try_get("key")?;
    let count = to_count(dimension, &key, row.try_get("count")?)?;

    Ok(CounterDocument {
        label: row.try_get("label")?,
        short_label: row.try_get("short_label")?,
        key,
        count,
    })
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn append_submission(&self, record: &SubmissionRecord) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO valentine_leads.valentines
            (id, name, phone, country_code, email, university, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&record.name)
        .bind(&record.phone)
        .bind(&record.country_code)
        .bind(&record.email)
        .bind(&record.university)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_counter(
        &self,
        dimension: Dimension,
        key: &str,
    ) -> Result<Option<CounterDocument>, StoreError> {
        let query = format!(
            "SELECT key, label, short_label, count FROM {} WHERE key = $1",
            counter_table(dimension)
        );

        let row = sqlx::query(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| counter_from_row(dimension, &row)).transpose()
    }

    async fn increment_counter(&self, dimension: Dimension, key: &str) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE {} SET count = count + 1 WHERE key = $1",
            counter_table(dimension)
        );

        let result = sqlx::query(&query)
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: dimension.collection(),
                key: key.to_string(),
            });
        }

        Ok(())
    }

    async fn create_counter(
        &self,
        dimension: Dimension,
        document: &CounterDocument,
    ) -> Result<(), StoreError> {
        let count = i64::try_from(document.count).map_err(|_| StoreError::Corrupt {
            collection: dimension.collection(),
            key: document.key.clone(),
            reason: format!("count {} out of range", document.count),
        })?;

        let query = format!(
            r#"
            INSERT INTO {} (key, label, short_label, count)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE
            SET label = EXCLUDED.label,
                short_label = EXCLUDED.short_label,
                count = EXCLUDED.count
            "#,
            counter_table(dimension)
        );

        sqlx::query(&query)
            .bind(&document.key)
            .bind(&document.label)
            .bind(&document.short_label)
            .bind(count)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_increment(
        &self,
        dimension: Dimension,
        key: &str,
        labels: &CounterLabels,
    ) -> Result<u64, StoreError> {
        let query = format!(
            r#"
            INSERT INTO {} AS counter (key, label, short_label, count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (key) DO UPDATE
            SET count = counter.count + 1
            RETURNING count
            "#,
            counter_table(dimension)
        );

        let count: i64 = sqlx::query(&query)
            .bind(key)
            .bind(&labels.label)
            .bind(&labels.short_label)
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        to_count(dimension, key, count)
    }

    async fn top_counters(
        &self,
        dimension: Dimension,
        limit: usize,
    ) -> Result<Vec<CounterDocument>, StoreError> {
        let query = format!(
            "SELECT key, label, short_label, count FROM {} \
             ORDER BY count DESC, key ASC LIMIT $1",
            counter_table(dimension)
        );

        let rows = sqlx::query(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(counter_from_row(dimension, &row)?);
        }

        Ok(documents)
    }
}
