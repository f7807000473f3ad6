use crate::{
    config::ScanOptions,
    driver::WarehouseConnection,
    error::{ContractViolation, Result},
    partition::{PartitionDescriptor, PartitionedSource, StatsReport},
    sql::SqlStatement,
};

/// Direct retrieval: execute the SELECT, keep the live result-set handle
/// on the coordinator only long enough to cut serializable slices, account
/// for the egress, then release it. Workers reopen slices over their own
/// connections.
pub fn direct_scan(
    connection: &mut dyn WarehouseConnection,
    select: &SqlStatement,
    options: &ScanOptions,
) -> Result<PartitionedSource> {
    let mut result = connection.execute(select)?;
    let query_id = result.query_id();
    let schema = result.schema();

    let rows = result
        .row_count()?
        .ok_or(ContractViolation::RowCountUnavailable)?;

    let slices = result.partition(options.expected_partition_size)?;
    if slices.is_empty() && rows > 0 {
        return Err(ContractViolation::Unpartitionable { rows }.into());
    }

    let stats: Vec<_> = slices.iter().map(|slice| slice.stats).collect();
    let report = StatsReport::aggregate(&stats);
    if report.row_count != rows {
        tracing::warn!(
            %query_id,
            reported = rows,
            accounted = report.row_count,
            "slice row counts disagree with the result row count"
        );
    }
    // Egress is accounted against the live handle; report before release.
    report.emit(Some(&query_id));
    drop(result);

    tracing::info!(
        %query_id,
        rows,
        partitions = slices.len(),
        "sliced result set for direct retrieval"
    );

    let descriptors = slices
        .into_iter()
        .map(|slice| PartitionDescriptor::ResultSlice {
            query_id: query_id.clone(),
            token: slice.token,
            stats: slice.stats,
        })
        .collect();

    Ok(PartitionedSource::new(
        schema,
        descriptors,
        options.network.clone(),
    ))
}
