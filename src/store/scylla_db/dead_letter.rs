use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, TryStreamExt};
use scylla::client::session::Session;
use std::sync::Arc;

use crate::store::{DeadLetter, DeadLetterStore};

pub struct ScyllaDeadLetterStore {
    session: Arc<Session>,
}

impl ScyllaDeadLetterStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

type DeadLetterRow = (String, String, String, String, i32, DateTime<Utc>, DateTime<Utc>);

fn from_row(row: DeadLetterRow) -> DeadLetter {
    let (event_type, resource_id, payload, error, failure_count, first_failed_at, last_failed_at) = row;
    DeadLetter {
        event_type,
        resource_id,
        payload,
        error,
        failure_count,
        first_failed_at,
        last_failed_at,
    }
}

const COLUMNS: &str =
    "event_type, resource_id, payload, error, failure_count, first_failed_at, last_failed_at";

#[async_trait]
impl DeadLetterStore for ScyllaDeadLetterStore {
    async fn record(&self, letter: DeadLetter) -> Result<()> {
        let existing = self
            .session
            .query_unpaged(
                format!(
                    "SELECT {} FROM webhook_dead_letters WHERE event_type = ? AND resource_id = ?",
                    COLUMNS
                ),
                (&letter.event_type, &letter.resource_id),
            )
            .await?
            .into_rows_result()
            .ok()
            .and_then(|rows| rows.maybe_first_row::<DeadLetterRow>().ok().flatten())
            .map(from_row);

        let (failure_count, first_failed_at) = match existing {
            Some(prev) => (prev.failure_count + 1, prev.first_failed_at),
            None => (letter.failure_count, letter.first_failed_at),
        };

        self.session
            .query_unpaged(
                format!("INSERT INTO webhook_dead_letters ({}) VALUES (?, ?, ?, ?, ?, ?, ?)", COLUMNS),
                (
                    &letter.event_type,
                    &letter.resource_id,
                    &letter.payload,
                    &letter.error,
                    failure_count,
                    first_failed_at,
                    letter.last_failed_at,
                ),
            )
            .await?;

        tracing::debug!(
            event_type = %letter.event_type,
            resource_id = %letter.resource_id,
            failure_count = failure_count,
            "Dead letter written"
        );
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<DeadLetter>> {
        let letters: Vec<DeadLetterRow> = self
            .session
            .query_iter(format!("SELECT {} FROM webhook_dead_letters", COLUMNS), ())
            .await?
            .rows_stream::<DeadLetterRow>()?
            .take(limit)
            .try_collect()
            .await?;

        Ok(letters.into_iter().map(from_row).collect())
    }
}
