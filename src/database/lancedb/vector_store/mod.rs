#[cfg(test)]
mod tests;

use super::scope::in_list;
use super::{
    DeleteCriteria, DocumentOrigin, MessageOrigin, NewRecord, QueryScope, RecordOrigin,
    ScoredRecord, StoredRecord,
};
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "records";

/// Tenant-scoped vector index backed by a local LanceDB table.
///
/// Every read and delete is confined to one workspace. The store owns the embedder
/// used to turn query text into vectors, so callers never mix models.
#[derive(Clone)]
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    dimension: usize,
    embedder: Arc<dyn Embedder>,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("table_name", &self.table_name)
            .field("dimension", &self.dimension)
            .field("embedder", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open the store in the configured vector database directory
    #[inline]
    pub async fn new(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open(&config.vector_database_path(), embedder).await
    }

    /// Open (creating if needed) the record table under `path`.
    ///
    /// An existing table built for a different vector dimension is rejected; records
    /// embedded by another model are never silently dropped.
    #[inline]
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.display().to_string();
        debug!("Connecting to LanceDB at {}", uri);
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            dimension: embedder.dimension(),
            embedder,
        };
        store.initialize_table().await?;

        info!(
            "Vector store ready ({} dimensions, model {})",
            store.dimension,
            store.embedder.model_name()
        );
        Ok(store)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != self.dimension {
                return Err(RagError::Config(format!(
                    "Vector index was built with {} dimensions but the embedder produces {}",
                    existing, self.dimension
                )));
            }
            debug!("Record table already exists with {} dimensions", existing);
            return Ok(());
        }

        info!("Creating record table with {} dimensions", self.dimension);
        self.connection
            .create_empty_table(&self.table_name, self.create_schema())
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("workspace_id", DataType::Utf8, false),
            Field::new("origin", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("message_id", DataType::Utf8, true),
            Field::new("user_id", DataType::Utf8, true),
            Field::new("channel_id", DataType::Utf8, true),
            Field::new("user_name", DataType::Utf8, true),
            Field::new("channel_name", DataType::Utf8, true),
            Field::new("timestamp", DataType::Utf8, true),
            Field::new("document_id", DataType::Utf8, true),
            Field::new("file_name", DataType::Utf8, true),
            Field::new("chunk_index", DataType::UInt32, true),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Write a batch of records and return the identifiers assigned to them, in input order.
    ///
    /// The batch is validated up front and appended in a single write, so either every
    /// record becomes visible or none does.
    #[inline]
    pub async fn upsert(&self, records: Vec<NewRecord>) -> Result<Vec<String>> {
        if records.is_empty() {
            debug!("No records to upsert");
            return Ok(Vec::new());
        }

        for record in &records {
            if record.workspace_id.trim().is_empty() {
                return Err(RagError::Validation(
                    "workspaceId must not be empty".to_string(),
                ));
            }
            if record.vector.len() != self.dimension {
                return Err(RagError::Validation(format!(
                    "Vector has {} dimensions, index expects {}",
                    record.vector.len(),
                    self.dimension
                )));
            }
        }

        let ids: Vec<String> = records
            .iter()
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();
        let record_batch = self.create_record_batch(&ids, &records)?;

        let table = self.open_table().await?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert records: {}", e)))?;

        info!("Stored {} records", ids.len());
        Ok(ids)
    }

    fn create_record_batch(&self, ids: &[String], records: &[NewRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let created_at = chrono::Utc::now().to_rfc3339();

        let mut workspace_ids = Vec::with_capacity(len);
        let mut origins = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut message_ids = Vec::with_capacity(len);
        let mut user_ids = Vec::with_capacity(len);
        let mut channel_ids = Vec::with_capacity(len);
        let mut user_names = Vec::with_capacity(len);
        let mut channel_names = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut file_names = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);

        for record in records {
            workspace_ids.push(record.workspace_id.as_str());
            origins.push(record.origin.kind());
            texts.push(record.text.as_str());
            flat_values.extend_from_slice(&record.vector);

            let message = match &record.origin {
                RecordOrigin::Message(message) => Some(message),
                RecordOrigin::Document(_) => None,
            };
            let document = match &record.origin {
                RecordOrigin::Document(document) => Some(document),
                RecordOrigin::Message(_) => None,
            };

            message_ids.push(message.map(|m| m.message_id.as_str()));
            user_ids.push(message.map(|m| m.user_id.as_str()));
            channel_ids.push(message.map(|m| m.channel_id.as_str()));
            user_names.push(message.map(|m| m.user_name.as_str()));
            channel_names.push(message.map(|m| m.channel_name.as_str()));
            timestamps.push(message.map(|m| m.timestamp.as_str()));
            document_ids.push(document.map(|d| d.document_id.as_str()));
            file_names.push(document.map(|d| d.file_name.as_str()));
            chunk_indices.push(document.map(|d| d.chunk_index));
        }

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(id_refs)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(workspace_ids)),
            Arc::new(StringArray::from(origins)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(message_ids)),
            Arc::new(StringArray::from(user_ids)),
            Arc::new(StringArray::from(channel_ids)),
            Arc::new(StringArray::from(user_names)),
            Arc::new(StringArray::from(channel_names)),
            Arc::new(StringArray::from(timestamps)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(file_names)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Embed `text` and return the closest records inside `scope`
    #[inline]
    pub async fn query(
        &self,
        text: &str,
        scope: &QueryScope,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let vector = self.embedder.embed_one(text).await?;
        self.search(&vector, scope, limit).await
    }

    /// Similarity search restricted to `scope`, best match first
    #[inline]
    pub async fn search(
        &self,
        vector: &[f32],
        scope: &QueryScope,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dimension {
            return Err(RagError::Validation(format!(
                "Query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimension
            )));
        }

        let predicate = scope.to_predicate();
        debug!("Vector search limit={} filter={}", limit, predicate);

        let table = self.open_table().await?;
        let stream = table
            .vector_search(vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .only_if(predicate)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut results = Vec::new();
        for batch in &batches {
            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

            for (row, record) in parse_batch(batch)?.into_iter().enumerate() {
                if !scope.matches(&record) {
                    warn!(
                        "Dropping record {} outside workspace {} from search results",
                        record.id,
                        scope.workspace_id()
                    );
                    continue;
                }

                let distance = distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
                results.push(ScoredRecord {
                    record,
                    score: 1.0 - distance,
                    distance,
                });
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);

        debug!("Vector search returned {} records", results.len());
        Ok(results)
    }

    /// Records inside `scope`, without ranking
    #[inline]
    pub async fn list(&self, scope: &QueryScope, limit: usize) -> Result<Vec<StoredRecord>> {
        let table = self.open_table().await?;
        let batches: Vec<RecordBatch> = table
            .query()
            .only_if(scope.to_predicate())
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to query records: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut records = Vec::new();
        for batch in &batches {
            records.extend(parse_batch(batch)?);
        }
        Ok(records)
    }

    /// Remove records on behalf of `workspace_id` and return how many were deleted.
    ///
    /// Identifier deletes fail with [`RagError::TenantViolation`] if any identifier
    /// belongs to another workspace, in which case nothing is removed. Unknown
    /// identifiers are ignored.
    #[inline]
    pub async fn delete(&self, workspace_id: &str, criteria: DeleteCriteria) -> Result<u64> {
        let caller = QueryScope::workspace(workspace_id)?;
        match criteria {
            DeleteCriteria::Ids(ids) => self.delete_ids(&caller, ids).await,
            DeleteCriteria::Scope(scope) => {
                if scope.workspace_id() != caller.workspace_id() {
                    return Err(RagError::TenantViolation(format!(
                        "Workspace {} cannot delete records of workspace {}",
                        caller.workspace_id(),
                        scope.workspace_id()
                    )));
                }
                self.delete_matching(&scope.to_predicate()).await
            }
        }
    }

    async fn delete_ids(&self, caller: &QueryScope, ids: Vec<String>) -> Result<u64> {
        let ids: Vec<String> = ids
            .into_iter()
            .filter(|id| !id.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let batches: Vec<RecordBatch> = table
            .query()
            .only_if(in_list("id", &ids))
            .limit(ids.len())
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to look up records: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut found = Vec::new();
        for batch in &batches {
            found.extend(parse_batch(batch)?);
        }

        if let Some(foreign) = found
            .iter()
            .find(|r| r.workspace_id != caller.workspace_id())
        {
            warn!(
                "Rejected delete of record {} from workspace {} by workspace {}",
                foreign.id,
                foreign.workspace_id,
                caller.workspace_id()
            );
            return Err(RagError::TenantViolation(format!(
                "Vector {} does not belong to workspace {}",
                foreign.id,
                caller.workspace_id()
            )));
        }

        if found.is_empty() {
            debug!("None of the {} requested vectors exist", ids.len());
            return Ok(0);
        }

        let existing: Vec<String> = found.into_iter().map(|r| r.id).collect();
        let predicate = format!("{} AND {}", caller.to_predicate(), in_list("id", &existing));
        self.delete_matching(&predicate).await
    }

    async fn delete_matching(&self, predicate: &str) -> Result<u64> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(Some(predicate.to_string()))
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        if count == 0 {
            return Ok(0);
        }

        table
            .delete(predicate)
            .await
            .map_err(|e| RagError::Database(format!("Failed to delete records: {}", e)))?;

        info!("Deleted {} records matching {}", count, predicate);
        Ok(count as u64)
    }

    /// Number of stored records, optionally restricted to a scope
    #[inline]
    pub async fn count(&self, scope: Option<&QueryScope>) -> Result<u64> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(scope.map(QueryScope::to_predicate))
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    /// Compact data files and prune old table versions
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        debug!("Optimizing vector database");
        self.open_table()
            .await?
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| RagError::Database(format!("Failed to optimize table: {}", e)))?;
        info!("Vector database optimization completed");
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn optional_value(column: &StringArray, row: usize) -> String {
    if column.is_null(row) {
        String::new()
    } else {
        column.value(row).to_string()
    }
}

/// Convert one result batch back into records
fn parse_batch(batch: &RecordBatch) -> Result<Vec<StoredRecord>> {
    let ids = string_column(batch, "id")?;
    let workspace_ids = string_column(batch, "workspace_id")?;
    let origins = string_column(batch, "origin")?;
    let texts = string_column(batch, "text")?;
    let message_ids = string_column(batch, "message_id")?;
    let user_ids = string_column(batch, "user_id")?;
    let channel_ids = string_column(batch, "channel_id")?;
    let user_names = string_column(batch, "user_name")?;
    let channel_names = string_column(batch, "channel_name")?;
    let timestamps = string_column(batch, "timestamp")?;
    let document_ids = string_column(batch, "document_id")?;
    let file_names = string_column(batch, "file_name")?;
    let created_ats = string_column(batch, "created_at")?;
    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| RagError::Database("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database("Invalid chunk_index column type".to_string()))?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let origin = match origins.value(row) {
            "message" => RecordOrigin::Message(MessageOrigin {
                message_id: optional_value(message_ids, row),
                user_id: optional_value(user_ids, row),
                channel_id: optional_value(channel_ids, row),
                user_name: optional_value(user_names, row),
                channel_name: optional_value(channel_names, row),
                timestamp: optional_value(timestamps, row),
            }),
            "document" => RecordOrigin::Document(DocumentOrigin {
                document_id: optional_value(document_ids, row),
                file_name: optional_value(file_names, row),
                chunk_index: if chunk_indices.is_null(row) {
                    0
                } else {
                    chunk_indices.value(row)
                },
            }),
            other => {
                return Err(RagError::Database(format!(
                    "Unknown record origin '{}'",
                    other
                )));
            }
        };

        records.push(StoredRecord {
            id: ids.value(row).to_string(),
            workspace_id: workspace_ids.value(row).to_string(),
            text: texts.value(row).to_string(),
            origin,
            created_at: created_ats.value(row).to_string(),
        });
    }

    Ok(records)
}
