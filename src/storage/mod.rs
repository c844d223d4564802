//! In-memory row storage.
//!
//! Every table owns one [`Partition`]: an ordered map from row id to row.
//! Row ids come from a per-partition counter and are never handed out twice,
//! so a scan always yields rows in insertion order.

mod partition;

use std::collections::HashMap;

use tracing::trace;

use crate::types::{error::StorageError, Chunk, Row, Value};

pub use partition::{Partition, PartitionReader};

pub type TableId = u64;
pub type RowId = u64;

/// Rows handed to the executor per chunk.
pub const CHUNK_SIZE: usize = 1024;

pub trait StorageReader {
    fn next_chunk(&mut self) -> Chunk;
}

#[derive(Debug, Default)]
pub struct StorageEngine {
    partitions: HashMap<TableId, Partition>,
}

impl StorageEngine {
    pub fn new() -> StorageEngine {
        StorageEngine::default()
    }

    /// Creates the partition for `table`, indexing each of `keys` for
    /// uniqueness lookups.
    pub fn create_partition(&mut self, table: TableId, width: usize, keys: Vec<Vec<usize>>) {
        trace!(table, width, keys = keys.len(), "creating partition");
        self.partitions.insert(table, Partition::with_keys(width, keys));
    }

    pub fn drop_partition(&mut self, table: TableId) -> bool {
        self.partitions.remove(&table).is_some()
    }

    pub fn insert(&mut self, table: TableId, row: Row) -> Result<RowId, StorageError> {
        self.partition_mut(table)?.insert(row)
    }

    /// A fresh scan over the live rows of `table`, starting at the first row.
    pub fn scan(
        &self,
        table: TableId,
    ) -> Result<impl Iterator<Item = (RowId, &Row)> + '_, StorageError> {
        Ok(self.partition(table)?.scan())
    }

    pub fn reader(&self, table: TableId) -> Result<PartitionReader<'_>, StorageError> {
        Ok(PartitionReader::new(self.partition(table)?, CHUNK_SIZE))
    }

    pub fn get(&self, table: TableId, row_id: RowId) -> Result<&Row, StorageError> {
        self.partition(table)?
            .get(row_id)
            .ok_or(StorageError::MissingRow(row_id))
    }

    pub fn update(&mut self, table: TableId, row_id: RowId, row: Row) -> Result<bool, StorageError> {
        self.partition_mut(table)?.update(row_id, row)
    }

    pub fn delete(&mut self, table: TableId, row_id: RowId) -> Result<bool, StorageError> {
        Ok(self.partition_mut(table)?.delete(row_id))
    }

    pub fn find_key(
        &self,
        table: TableId,
        key: usize,
        tuple: &[Value],
    ) -> Result<Option<RowId>, StorageError> {
        Ok(self.partition(table)?.find_key(key, tuple))
    }

    pub fn last_key(&self, table: TableId, key: usize) -> Result<Option<&[Value]>, StorageError> {
        Ok(self.partition(table)?.last_key(key))
    }

    pub fn row_count(&self, table: TableId) -> Result<usize, StorageError> {
        Ok(self.partition(table)?.len())
    }

    fn partition(&self, table: TableId) -> Result<&Partition, StorageError> {
        self.partitions
            .get(&table)
            .ok_or(StorageError::UnknownPartition(table))
    }

    fn partition_mut(&mut self, table: TableId) -> Result<&mut Partition, StorageError> {
        self.partitions
            .get_mut(&table)
            .ok_or(StorageError::UnknownPartition(table))
    }
}
