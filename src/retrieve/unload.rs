use std::time::{SystemTime, UNIX_EPOCH};

use arrow::datatypes::SchemaRef;
use url::Url;

use crate::{
    config::ScanOptions,
    decode::StagedFormat,
    driver::WarehouseConnection,
    error::{Result, StageError},
    partition::{PartitionDescriptor, PartitionStats, PartitionedSource, StatsReport},
    sql::{SqlStatement, select::build_unload},
    stage::StageStore,
};

/// Bulk unload retrieval: wrap the SELECT in the warehouse's unload
/// command, write the result to a scan-scoped stage location, and cut one
/// partition per staged file. Workers fetch and decode independently.
pub fn unload_scan(
    connection: &mut dyn WarehouseConnection,
    stage: &dyn StageStore,
    select: &SqlStatement,
    schema: SchemaRef,
    options: &ScanOptions,
) -> Result<PartitionedSource> {
    let base = options.stage_location()?;
    let location = scan_scoped(base)?;
    let format = StagedFormat::for_schema(&schema);

    let unload = build_unload(select, &location, format, options.expected_partition_size);
    let rows = connection.execute_update(&unload)?;
    tracing::info!(
        rows = rows.unwrap_or(-1),
        %location,
        %format,
        "unloaded scan result to stage"
    );

    let files = stage.list(&location)?;
    let stats: Vec<PartitionStats> = files
        .iter()
        .map(|file| PartitionStats {
            row_count: 0,
            compressed_bytes: file.size,
            uncompressed_bytes: 0,
        })
        .collect();
    StatsReport::aggregate(&stats).emit(None);

    let descriptors = files
        .into_iter()
        .map(|file| PartitionDescriptor::Staged {
            location: file.location,
            name: file.name,
            format,
            compressed_bytes: file.size,
        })
        .collect();

    Ok(PartitionedSource::new(
        schema,
        descriptors,
        options.network.clone(),
    ))
}

/// A fresh subdirectory per scan, so concurrent scans and retries never
/// see each other's files.
fn scan_scoped(base: &Url) -> Result<Url> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    Ok(base
        .join(&format!("unload-{:x}/", nanos))
        .map_err(|_| StageError::Location(base.clone()))?)
}
