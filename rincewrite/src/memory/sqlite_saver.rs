//! SQLite-backed checkpointer (SqliteSaver). Persistent across process restarts.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::memory::checkpoint::{
    Checkpoint, CheckpointListItem, CheckpointMetadata, CheckpointSource,
};
use crate::memory::checkpointer::{window_history, CheckpointError, Checkpointer};
use crate::memory::config::RunnableConfig;
use crate::memory::serializer::Serializer;

fn storage(e: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Storage(e.to_string())
}

fn parse_created_at(v: Option<String>) -> Option<DateTime<Utc>> {
    v.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Row shape shared by the latest/pinned lookups.
type CheckpointRow = (
    String,
    String,
    Vec<u8>,
    Option<String>,
    String,
    i64,
    Option<String>,
    Option<String>,
);

const SELECT_COLUMNS: &str = "checkpoint_id, ts, payload, next_node, metadata_source, \
     metadata_step, metadata_created_at, metadata_writes";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckpointRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// SQLite-backed checkpointer. Key: (thread_id, checkpoint_ns, checkpoint_id);
/// insertion order is kept by an autoincrement `seq` column.
///
/// One connection is shared behind a mutex and used from `spawn_blocking`, so an
/// in-memory database (`":memory:"`) keeps its contents for the saver's lifetime.
///
/// **Interaction**: Used as `Arc<dyn Checkpointer<S>>` in `StateGraph::compile_with_checkpointer`.
pub struct SqliteSaver<S> {
    conn: Arc<Mutex<Connection>>,
    serializer: Arc<dyn Serializer<S>>,
}

impl<S> SqliteSaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Opens (or creates) the database and ensures the table exists.
    pub fn new(
        path: impl AsRef<Path>,
        serializer: Arc<dyn Serializer<S>>,
    ) -> Result<Self, CheckpointError> {
        let conn = Connection::open(path.as_ref()).map_err(storage)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                checkpoint_ns TEXT NOT NULL,
                checkpoint_id TEXT NOT NULL,
                ts TEXT NOT NULL,
                payload BLOB NOT NULL,
                next_node TEXT,
                metadata_source TEXT NOT NULL,
                metadata_step INTEGER NOT NULL,
                metadata_created_at TEXT,
                metadata_writes TEXT,
                UNIQUE (thread_id, checkpoint_ns, checkpoint_id)
            );
            CREATE INDEX IF NOT EXISTS checkpoints_by_thread
                ON checkpoints (thread_id, checkpoint_ns, seq);
            "#,
        )
        .map_err(storage)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            serializer,
        })
    }

    fn thread_id_required(config: &RunnableConfig) -> Result<String, CheckpointError> {
        config
            .thread_id
            .clone()
            .ok_or(CheckpointError::ThreadIdRequired)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, CheckpointError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CheckpointError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|e| storage(format!("lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(storage)?
    }
}

#[async_trait]
impl<S> Checkpointer<S> for SqliteSaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
    ) -> Result<String, CheckpointError> {
        let thread_id = Self::thread_id_required(config)?;
        let checkpoint_ns = config.checkpoint_ns.clone();
        let payload = self.serializer.serialize(&checkpoint.channel_values)?;
        let id = checkpoint.id.clone();
        let ts = checkpoint.ts.clone();
        let next = checkpoint.next.clone();
        let source = checkpoint.metadata.source.as_str();
        let step = checkpoint.metadata.step;
        let created_at = checkpoint.metadata.created_at.map(|t| t.to_rfc3339());
        let writes = checkpoint.metadata.writes.clone();

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO checkpoints
                (thread_id, checkpoint_ns, checkpoint_id, ts, payload, next_node,
                 metadata_source, metadata_step, metadata_created_at, metadata_writes)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    thread_id,
                    checkpoint_ns,
                    id,
                    ts,
                    payload,
                    next,
                    source,
                    step,
                    created_at,
                    writes
                ],
            )
            .map_err(storage)?;
            Ok(id)
        })
        .await
    }

    async fn get_tuple(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<(Checkpoint<S>, CheckpointMetadata)>, CheckpointError> {
        let thread_id = Self::thread_id_required(config)?;
        let checkpoint_ns = config.checkpoint_ns.clone();
        let want_id = config.checkpoint_id.clone();

        let row = self
            .with_conn(move |conn| {
                let found = match want_id {
                    Some(cid) => conn
                        .query_row(
                            &format!(
                                "SELECT {} FROM checkpoints \
                                 WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND checkpoint_id = ?3",
                                SELECT_COLUMNS
                            ),
                            params![thread_id, checkpoint_ns, cid],
                            read_row,
                        )
                        .optional(),
                    None => conn
                        .query_row(
                            &format!(
                                "SELECT {} FROM checkpoints \
                                 WHERE thread_id = ?1 AND checkpoint_ns = ?2 \
                                 ORDER BY seq DESC LIMIT 1",
                                SELECT_COLUMNS
                            ),
                            params![thread_id, checkpoint_ns],
                            read_row,
                        )
                        .optional(),
                };
                found.map_err(storage)
            })
            .await?;

        let Some((id, ts, payload, next, source, step, created_at, writes)) = row else {
            return Ok(None);
        };
        let channel_values = self.serializer.deserialize(&payload)?;
        let metadata = CheckpointMetadata {
            source: CheckpointSource::parse(&source),
            step,
            created_at: parse_created_at(created_at),
            writes,
        };
        let checkpoint = Checkpoint {
            id,
            ts,
            channel_values,
            next,
            metadata: metadata.clone(),
        };
        Ok(Some((checkpoint, metadata)))
    }

    async fn list(
        &self,
        config: &RunnableConfig,
        limit: Option<usize>,
        before: Option<&str>,
    ) -> Result<Vec<CheckpointListItem>, CheckpointError> {
        let thread_id = Self::thread_id_required(config)?;
        let checkpoint_ns = config.checkpoint_ns.clone();

        let items = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT checkpoint_id, next_node, metadata_source, metadata_step, \
                         metadata_created_at, metadata_writes FROM checkpoints \
                         WHERE thread_id = ?1 AND checkpoint_ns = ?2 ORDER BY seq ASC",
                    )
                    .map_err(storage)?;
                let rows = stmt
                    .query_map(params![thread_id, checkpoint_ns], |row| {
                        let source: String = row.get(2)?;
                        let created_at: Option<String> = row.get(4)?;
                        Ok(CheckpointListItem {
                            checkpoint_id: row.get(0)?,
                            next: row.get(1)?,
                            metadata: CheckpointMetadata {
                                source: CheckpointSource::parse(&source),
                                step: row.get(3)?,
                                created_at: parse_created_at(created_at),
                                writes: row.get(5)?,
                            },
                        })
                    })
                    .map_err(storage)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(storage)
            })
            .await?;
        Ok(window_history(items, limit, before))
    }
}
