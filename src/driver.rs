use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

use arrow::{
    datatypes::SchemaRef,
    record_batch::{RecordBatch, RecordBatchReader},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    partition::PartitionStats,
    schema::{TableRef, TableSource},
    sql::SqlStatement,
};

/// The warehouse-assigned identifier of an executed query, carried on
/// partition descriptors so workers can reopen the result remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryId(pub String);

impl Display for QueryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// One slice of a live result set as cut by the driver: an opaque
/// resumption token plus the driver's accounting for the slice.
#[derive(Debug, Clone)]
pub struct SlicePartition {
    pub token: Vec<u8>,
    pub stats: PartitionStats,
}

/// Connection factory. The coordinator opens one connection per scan and
/// each worker opens its own; connections are never shared.
pub trait WarehouseDatabase {
    fn connect(&self) -> Result<Box<dyn WarehouseConnection>>;
}

/// A live warehouse session. Connection setup, authentication and wire
/// details live behind this seam; errors pass through with the remote
/// message intact.
pub trait WarehouseConnection {
    /// Discover the schema of a table or subquery without fetching rows.
    fn table_schema(&mut self, source: &TableSource) -> Result<SchemaRef>;

    /// Execute a query and hand back the live result-set handle.
    fn execute(&mut self, statement: &SqlStatement) -> Result<Box<dyn ResultSet>>;

    /// Execute a statement for effect, returning the affected row count
    /// when the driver reports one.
    fn execute_update(&mut self, statement: &SqlStatement) -> Result<Option<i64>>;

    /// Append record batches to an existing table, returning rows written.
    fn ingest(&mut self, table: &TableRef, batches: &[RecordBatch]) -> Result<u64>;

    /// Worker side: reopen one slice of a previously executed query from
    /// its descriptor alone. The network map is passed through opaquely.
    fn read_partition(
        &mut self,
        query_id: &QueryId,
        token: &[u8],
        network: &BTreeMap<String, String>,
    ) -> Result<Box<dyn RecordBatchReader + Send>>;
}

/// The coordinator's handle on an executed query. Dropped as soon as the
/// partition descriptors are cut; workers never see it.
pub trait ResultSet {
    fn schema(&self) -> SchemaRef;

    fn query_id(&self) -> QueryId;

    /// Total rows in the result. `None` means the driver cannot say, which
    /// the direct path treats as a fatal contract violation.
    fn row_count(&mut self) -> Result<Option<u64>>;

    /// Slice the result into independently readable partitions of roughly
    /// `target_bytes` uncompressed each. Empty on an empty result.
    fn partition(&mut self, target_bytes: u64) -> Result<Vec<SlicePartition>>;

    /// Read the result inline through this handle. Only the count path
    /// uses this; data scans go through partitions.
    fn batches(&mut self) -> Result<Box<dyn RecordBatchReader + Send>>;
}
