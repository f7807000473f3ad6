use std::sync::Arc;

use arrow::{
    array::AsArray,
    datatypes::{Int64Type, Schema},
};

use crate::{
    config::ScanOptions,
    driver::WarehouseConnection,
    error::{ContractViolation, Result},
    partition::{PartitionDescriptor, PartitionedSource},
    schema::TableSource,
    sql::{filters::WhereClause, select::build_count},
};

/// Zero-column fast path: push `SELECT count(*)` with the same WHERE the
/// data scan would have used, then hand the engine `count` empty records
/// spread over the configured partition count. No row data moves.
pub fn count_scan(
    connection: &mut dyn WarehouseConnection,
    source: &TableSource,
    where_clause: Option<&WhereClause>,
    options: &ScanOptions,
) -> Result<PartitionedSource> {
    let statement = build_count(source, where_clause, options.bind_variable_enabled);
    let mut result = connection.execute(&statement)?;
    let count = read_count(result.batches()?)?;

    let partitions = options.count_partitions.max(1);
    tracing::info!(
        source = source.display_name(),
        rows = count,
        partitions,
        "count-only scan, returning empty records"
    );

    let descriptors = distribute(count, partitions)
        .into_iter()
        .map(|rows| PartitionDescriptor::EmptyRows { rows })
        .collect();

    Ok(PartitionedSource::new(
        Arc::new(Schema::empty()),
        descriptors,
        options.network.clone(),
    ))
}

fn read_count(
    reader: Box<dyn arrow::record_batch::RecordBatchReader + Send>,
) -> Result<u64> {
    for batch in reader {
        let batch = batch?;
        if batch.num_rows() == 0 {
            continue;
        }
        let column = batch.column(0);
        let counts = column
            .as_primitive_opt::<Int64Type>()
            .ok_or_else(|| ContractViolation::CountNotInteger {
                datatype: column.data_type().to_string(),
            })?;
        return Ok(counts.value(0).max(0) as u64);
    }
    Err(ContractViolation::CountWithoutRow.into())
}

/// Spread `rows` across exactly `partitions` buckets, front-loading the
/// remainder so the sum is exact.
fn distribute(rows: u64, partitions: usize) -> Vec<u64> {
    let partitions = partitions as u64;
    let base = rows / partitions;
    let remainder = rows % partitions;
    (0..partitions)
        .map(|index| base + u64::from(index < remainder))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_is_exhaustive_and_even() {
        let buckets = distribute(1005, 200);
        assert_eq!(buckets.len(), 200);
        assert_eq!(buckets.iter().sum::<u64>(), 1005);
        assert!(buckets.iter().all(|&b| b == 5 || b == 6));
    }

    #[test]
    fn distribution_handles_fewer_rows_than_partitions() {
        let buckets = distribute(3, 200);
        assert_eq!(buckets.len(), 200);
        assert_eq!(buckets.iter().sum::<u64>(), 3);
        assert_eq!(buckets.iter().filter(|&&b| b == 1).count(), 3);
    }

    #[test]
    fn distribution_of_zero_rows() {
        let buckets = distribute(0, 4);
        assert_eq!(buckets, vec![0, 0, 0, 0]);
    }
}
