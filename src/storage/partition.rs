use std::collections::btree_map::{self, BTreeMap};

use crate::types::{error::StorageError, Chunk, Row, Value};

use super::{RowId, StorageReader};

/// Maps the values of a key's columns to the row holding them. Tuples
/// containing NULL are not indexed.
#[derive(Debug)]
struct UniqueIndex {
    columns: Vec<usize>,
    entries: BTreeMap<Vec<Value>, RowId>,
}

impl UniqueIndex {
    fn tuple(&self, row: &Row) -> Option<Vec<Value>> {
        let tuple: Vec<Value> = self.columns.iter().map(|&i| row[i].clone()).collect();
        if tuple.iter().any(Value::is_null) {
            None
        } else {
            Some(tuple)
        }
    }

    fn add(&mut self, row_id: RowId, row: &Row) {
        if let Some(tuple) = self.tuple(row) {
            self.entries.insert(tuple, row_id);
        }
    }

    // Another row may already have taken over the tuple during a
    // multi-row update, so only our own entry is removed.
    fn remove(&mut self, row_id: RowId, row: &Row) {
        if let Some(tuple) = self.tuple(row) {
            if self.entries.get(&tuple) == Some(&row_id) {
                self.entries.remove(&tuple);
            }
        }
    }
}

#[derive(Debug)]
pub struct Partition {
    rows: BTreeMap<RowId, Row>,
    next_row_id: RowId,
    width: usize,
    indexes: Vec<UniqueIndex>,
}

impl Partition {
    pub fn new(width: usize) -> Partition {
        Partition::with_keys(width, Vec::new())
    }

    /// A partition that keeps one unique index per entry of `keys`, each a
    /// list of column positions.
    pub fn with_keys(width: usize, keys: Vec<Vec<usize>>) -> Partition {
        Partition {
            rows: BTreeMap::new(),
            next_row_id: 1,
            width,
            indexes: keys
                .into_iter()
                .map(|columns| UniqueIndex {
                    columns,
                    entries: BTreeMap::new(),
                })
                .collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn insert(&mut self, row: Row) -> Result<RowId, StorageError> {
        self.check_shape(&row)?;
        let row_id = self.next_row_id;
        self.next_row_id += 1;
        for index in &mut self.indexes {
            index.add(row_id, &row);
        }
        self.rows.insert(row_id, row);
        Ok(row_id)
    }

    pub fn get(&self, row_id: RowId) -> Option<&Row> {
        self.rows.get(&row_id)
    }

    pub fn update(&mut self, row_id: RowId, row: Row) -> Result<bool, StorageError> {
        self.check_shape(&row)?;
        match self.rows.get_mut(&row_id) {
            Some(existing) => {
                for index in &mut self.indexes {
                    index.remove(row_id, existing);
                    index.add(row_id, &row);
                }
                *existing = row;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete(&mut self, row_id: RowId) -> bool {
        match self.rows.remove(&row_id) {
            Some(row) => {
                for index in &mut self.indexes {
                    index.remove(row_id, &row);
                }
                true
            }
            None => false,
        }
    }

    /// The row currently holding `tuple` in the index for key `key`.
    pub fn find_key(&self, key: usize, tuple: &[Value]) -> Option<RowId> {
        self.indexes.get(key)?.entries.get(tuple).copied()
    }

    /// The greatest tuple in the index for key `key`.
    pub fn last_key(&self, key: usize) -> Option<&[Value]> {
        let (tuple, _) = self.indexes.get(key)?.entries.last_key_value()?;
        Some(tuple)
    }

    pub fn scan(&self) -> impl Iterator<Item = (RowId, &Row)> + '_ {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    fn check_shape(&self, row: &Row) -> Result<(), StorageError> {
        if row.len() != self.width {
            return Err(StorageError::ShapeMismatch {
                expected: self.width,
                found: row.len(),
            });
        }
        Ok(())
    }
}

/// Hands out a partition's rows in fixed-size chunks.
pub struct PartitionReader<'a> {
    iter: btree_map::Values<'a, RowId, Row>,
    chunk_size: usize,
}

impl<'a> PartitionReader<'a> {
    pub fn new(partition: &'a Partition, chunk_size: usize) -> PartitionReader<'a> {
        PartitionReader {
            iter: partition.rows.values(),
            chunk_size,
        }
    }
}

impl StorageReader for PartitionReader<'_> {
    fn next_chunk(&mut self) -> Chunk {
        let mut chunk = Chunk::default();

        for row in self.iter.by_ref() {
            chunk.rows.push(row.clone());
            if chunk.rows.len() >= self.chunk_size {
                break;
            }
        }

        chunk
    }
}
