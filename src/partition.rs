use std::collections::BTreeMap;

use arrow::{
    array::{RecordBatchIterator, RecordBatchOptions},
    datatypes::SchemaRef,
    record_batch::{RecordBatch, RecordBatchReader},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    decode::{StagedFormat, decode_batches},
    driver::{QueryId, WarehouseDatabase},
    error::{Error, Result},
    stage::StageStore,
};

/// Driver-reported accounting for one partition of a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub row_count: u64,
    pub compressed_bytes: u64,
    pub uncompressed_bytes: u64,
}

/// Aggregate view over all partitions of a scan. Derived, logged once,
/// then discarded; it never influences the returned data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsReport {
    pub partitions: u64,
    pub row_count: u64,
    pub compressed_bytes: u64,
    pub uncompressed_bytes: u64,
    pub avg_rows: u64,
    pub avg_compressed_bytes: u64,
    pub avg_uncompressed_bytes: u64,
}

impl StatsReport {
    pub fn aggregate(stats: &[PartitionStats]) -> Self {
        let partitions = stats.len() as u64;
        let row_count = stats.iter().map(|s| s.row_count).sum();
        let compressed_bytes = stats.iter().map(|s| s.compressed_bytes).sum();
        let uncompressed_bytes = stats.iter().map(|s| s.uncompressed_bytes).sum();
        // An eager driver can hand back zero partitions for an empty result.
        let divisor = partitions.max(1);
        StatsReport {
            partitions,
            row_count,
            compressed_bytes,
            uncompressed_bytes,
            avg_rows: row_count / divisor,
            avg_compressed_bytes: compressed_bytes / divisor,
            avg_uncompressed_bytes: uncompressed_bytes / divisor,
        }
    }

    pub fn emit(&self, query_id: Option<&QueryId>) {
        tracing::info!(
            query_id = query_id.map(|id| id.0.as_str()),
            partitions = self.partitions,
            rows = self.row_count,
            compressed_bytes = self.compressed_bytes,
            uncompressed_bytes = self.uncompressed_bytes,
            avg_rows = self.avg_rows,
            avg_compressed_bytes = self.avg_compressed_bytes,
            avg_uncompressed_bytes = self.avg_uncompressed_bytes,
            "retrieval statistics"
        );
    }
}

/// Everything a worker needs to read its share of the result. Serializable
/// and self-sufficient: no handle or callback back to the coordinator.
/// Together the descriptors of a scan cover the result exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartitionDescriptor {
    /// One file the unload wrote to the transient stage.
    Staged {
        location: Url,
        name: String,
        format: StagedFormat,
        compressed_bytes: u64,
    },
    /// One driver-cut slice of a live result set.
    ResultSlice {
        query_id: QueryId,
        token: Vec<u8>,
        stats: PartitionStats,
    },
    /// A run of empty records from the count-only path; no data moves.
    EmptyRows { rows: u64 },
}

/// Worker-side collaborators for reopening descriptors.
pub struct WorkerEnv<'a> {
    pub database: &'a dyn WarehouseDatabase,
    pub stage: &'a dyn StageStore,
}

/// The partitioned record source handed back to the engine: the resolved
/// schema, the descriptors, and the opaque network settings workers need
/// to reach the warehouse.
#[derive(Debug, Clone)]
pub struct PartitionedSource {
    schema: SchemaRef,
    descriptors: Vec<PartitionDescriptor>,
    network: BTreeMap<String, String>,
}

impl PartitionedSource {
    pub fn new(
        schema: SchemaRef,
        descriptors: Vec<PartitionDescriptor>,
        network: BTreeMap<String, String>,
    ) -> Self {
        PartitionedSource {
            schema,
            descriptors,
            network,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn descriptors(&self) -> &[PartitionDescriptor] {
        &self.descriptors
    }

    pub fn partition_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Open one partition on a worker. Staged files are fetched and
    /// decoded; result slices are reopened over a fresh connection; empty
    /// runs materialize locally.
    pub fn open(
        &self,
        index: usize,
        env: &WorkerEnv<'_>,
    ) -> Result<Box<dyn RecordBatchReader + Send>> {
        let descriptor = self.descriptors.get(index).ok_or_else(|| {
            Error::invalid_request(format!(
                "partition index {} out of range, scan has {} partitions",
                index,
                self.descriptors.len()
            ))
        })?;

        match descriptor {
            PartitionDescriptor::Staged {
                location, format, ..
            } => {
                let bytes = env.stage.fetch(location)?;
                let batches =
                    decode_batches(*format, &self.schema, &bytes).map_err(Error::decode(index))?;
                tracing::debug!(partition = index, %location, "decoded staged partition");
                Ok(Box::new(RecordBatchIterator::new(
                    batches.into_iter().map(Ok),
                    self.schema.clone(),
                )))
            }
            PartitionDescriptor::ResultSlice {
                query_id, token, ..
            } => {
                let mut connection = env.database.connect()?;
                connection.read_partition(query_id, token, &self.network)
            }
            PartitionDescriptor::EmptyRows { rows } => {
                let batch = RecordBatch::try_new_with_options(
                    self.schema.clone(),
                    vec![],
                    &RecordBatchOptions::new().with_row_count(Some(*rows as usize)),
                )?;
                Ok(Box::new(RecordBatchIterator::new(
                    std::iter::once(Ok(batch)),
                    self.schema.clone(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::Schema;

    use super::*;
    use crate::{driver::WarehouseConnection, stage::InMemoryStage};

    struct NoDatabase;

    impl WarehouseDatabase for NoDatabase {
        fn connect(&self) -> Result<Box<dyn WarehouseConnection>> {
            Err(Error::invalid_request("no connection in this test"))
        }
    }

    #[test]
    fn aggregation_sums_and_averages() {
        let report = StatsReport::aggregate(&[
            PartitionStats {
                row_count: 10,
                compressed_bytes: 100,
                uncompressed_bytes: 400,
            },
            PartitionStats {
                row_count: 30,
                compressed_bytes: 300,
                uncompressed_bytes: 800,
            },
        ]);
        assert_eq!(report.partitions, 2);
        assert_eq!(report.row_count, 40);
        assert_eq!(report.avg_rows, 20);
        assert_eq!(report.avg_compressed_bytes, 200);
        assert_eq!(report.avg_uncompressed_bytes, 600);
    }

    #[test]
    fn zero_partitions_do_not_divide_by_zero() {
        let report = StatsReport::aggregate(&[]);
        assert_eq!(report.partitions, 0);
        assert_eq!(report.row_count, 0);
        assert_eq!(report.avg_rows, 0);
        assert_eq!(report.avg_uncompressed_bytes, 0);
    }

    #[test]
    fn descriptors_round_trip_through_serde() {
        let descriptor = PartitionDescriptor::ResultSlice {
            query_id: QueryId("01b2-cafe".to_string()),
            token: vec![1, 2, 3],
            stats: PartitionStats {
                row_count: 7,
                compressed_bytes: 64,
                uncompressed_bytes: 256,
            },
        };
        let text = serde_json::to_string(&descriptor).unwrap();
        let back: PartitionDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn empty_rows_partition_materializes_locally() {
        let source = PartitionedSource::new(
            Arc::new(Schema::empty()),
            vec![
                PartitionDescriptor::EmptyRows { rows: 3 },
                PartitionDescriptor::EmptyRows { rows: 0 },
            ],
            BTreeMap::new(),
        );
        let stage = InMemoryStage::new();
        let env = WorkerEnv {
            database: &NoDatabase,
            stage: &stage,
        };

        let rows: usize = source
            .open(0, &env)
            .unwrap()
            .map(|batch| batch.unwrap().num_rows())
            .sum();
        assert_eq!(rows, 3);

        let rows: usize = source
            .open(1, &env)
            .unwrap()
            .map(|batch| batch.unwrap().num_rows())
            .sum();
        assert_eq!(rows, 0);
    }

    #[test]
    fn out_of_range_partition_is_invalid() {
        let source =
            PartitionedSource::new(Arc::new(Schema::empty()), vec![], BTreeMap::new());
        let stage = InMemoryStage::new();
        let env = WorkerEnv {
            database: &NoDatabase,
            stage: &stage,
        };
        assert!(matches!(
            source.open(0, &env),
            Err(Error::InvalidRequest(_))
        ));
    }
}
