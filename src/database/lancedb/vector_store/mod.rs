
use super::{EmbeddingRecord, ScoredChunk};
use crate::config::Config;
use crate::corpus::{ChunkMetadata, DocumentChunk};
use crate::database::{MetadataFilter, VectorIndex};
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TEXT_COLUMNS: [&str; 6] = [
    "text",
    "source_path",
    "framework",
    "version",
    "lang",
    "filename",
];

/// Vector database store using LanceDB for similarity search.
///
/// Each collection is one LanceDB table.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

impl VectorStore {
    /// Open `collection` in the configured vector database
    ///
    /// # Arguments
    /// * `config` - Application configuration containing database paths
    /// * `collection` - Name of the collection (table) to use
    #[inline]
    pub async fn open(config: &Config, collection: &str) -> Result<Self> {
        Self::open_at(&config.vector_database_path(), collection).await
    }

    /// Open `collection` in the LanceDB database at `db_path`
    #[inline]
    pub async fn open_at(db_path: &Path, collection: &str) -> Result<Self> {
        crate::config::settings::validate_collection_name(collection)
            .map_err(|e| RagError::Config(e.to_string()))?;

        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.display().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("Vector store opened for collection '{}'", collection);
        Ok(Self {
            connection,
            table_name: collection.to_string(),
        })
    }

    /// Names of all collections in the database
    #[inline]
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))
    }

    async fn table_exists(&self) -> Result<bool> {
        Ok(self.list_collections().await?.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        if !self.table_exists().await? {
            return Err(RagError::CollectionMissing(self.table_name.clone()));
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self, table: &Table) -> Result<usize> {
        let schema = table
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

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        let mut fields = vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
        ];
        fields.extend(
            TEXT_COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, false)),
        );
        fields.push(Field::new("created_at", DataType::Utf8, false));
        Arc::new(Schema::new(fields))
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let len = records.len();

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for record in records {
            if record.vector.len() != vector_dim {
                return Err(RagError::Database(format!(
                    "Inconsistent vector dimensions in batch: {} vs {}",
                    record.vector.len(),
                    vector_dim
                )));
            }
            flat_values.extend_from_slice(&record.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    RagError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let column = |get: fn(&EmbeddingRecord) -> &str| -> Arc<dyn Array> {
            Arc::new(StringArray::from(records.iter().map(get).collect::<Vec<_>>()))
        };

        let arrays: Vec<Arc<dyn Array>> = vec![
            column(|r| r.id.as_str()),
            Arc::new(vector_array),
            column(|r| r.chunk.text.as_str()),
            column(|r| r.chunk.metadata.source_path.as_str()),
            column(|r| r.chunk.metadata.framework.as_str()),
            column(|r| r.chunk.metadata.version.as_str()),
            column(|r| r.chunk.metadata.lang.as_str()),
            column(|r| r.chunk.metadata.filename.as_str()),
            column(|r| r.created_at.as_str()),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Parse search results from LanceDB stream into ScoredChunk structs
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<ScoredChunk>> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch_result)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
        let string_column = |name: &str| -> Result<&StringArray> {
            batch
                .column_by_name(name)
                .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
        };

        let texts = string_column("text")?;
        let source_paths = string_column("source_path")?;
        let frameworks = string_column("framework")?;
        let versions = string_column("version")?;
        let langs = string_column("lang")?;
        let filenames = string_column("filename")?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| RagError::Database("Invalid _distance column type".to_string()))?;

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let chunk = DocumentChunk {
                text: texts.value(row).to_string(),
                metadata: ChunkMetadata {
                    source_path: source_paths.value(row).to_string(),
                    framework: frameworks.value(row).to_string(),
                    version: versions.value(row).to_string(),
                    lang: langs.value(row).to_string(),
                    filename: filenames.value(row).to_string(),
                },
            };

            if distances.is_null(row) {
                return Err(RagError::Database(format!("Null _distance in row {}", row)));
            }

            search_results.push(ScoredChunk {
                chunk,
                distance: distances.value(row),
            });
        }

        Ok(search_results)
    }
}

#[async_trait]
impl VectorIndex for VectorStore {
    #[inline]
    fn collection(&self) -> &str {
        &self.table_name
    }

    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(());
        };
        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(RagError::Database("Cannot store empty vectors".to_string()));
        }

        debug!(
            "Storing batch of {} embeddings in '{}'",
            records.len(),
            self.table_name
        );

        let table = if self.table_exists().await? {
            let table = self.open_table().await?;
            let existing_dim = self.detect_existing_vector_dimension(&table).await?;
            if existing_dim != vector_dim {
                return Err(RagError::Database(format!(
                    "Embedding dimension {} does not match collection '{}' ({}); the embedding model changed, re-ingest with --recreate",
                    vector_dim, self.table_name, existing_dim
                )));
            }
            table
        } else {
            info!(
                "Creating collection '{}' with {} dimensions",
                self.table_name, vector_dim
            );
            self.connection
                .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
                .execute()
                .await
                .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?
        };

        let record_batch = Self::create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        debug!("Stored {} embeddings", records.len());
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>> {
        debug!(
            "Searching '{}' with limit {} and filter {:?}",
            self.table_name,
            limit,
            filter.to_predicate()
        );

        let table = self.open_table().await?;

        let mut query = table
            .vector_search(vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(predicate) = filter.to_predicate() {
            query = query.only_if(predicate);
        }

        let results = query
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        Self::parse_search_results_stream(results).await
    }

    async fn drop_collection(&self) -> Result<()> {
        if !self.table_exists().await? {
            return Err(RagError::CollectionMissing(self.table_name.clone()));
        }

        info!("Dropping collection '{}'", self.table_name);
        self.connection
            .drop_table(&self.table_name)
            .await
            .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))
    }

    async fn count(&self) -> Result<u64> {
        if !self.table_exists().await? {
            warn!("Collection '{}' does not exist", self.table_name);
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}
