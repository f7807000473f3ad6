use std::sync::Arc;

use arrow::{
    datatypes::{Schema, SchemaRef},
    record_batch::RecordBatch,
};

use crate::{
    config::ScanOptions,
    driver::WarehouseDatabase,
    error::{Error, Result},
    partition::PartitionedSource,
    retrieve::{self, RetrievalStrategy, count, direct, unload},
    schema::{Relation, TableRef},
    sql::{
        filters::{self, Filter},
        select::{build_select, truncate},
    },
    stage::StageStore,
};

/// One logical scan as requested by the engine: the columns to project, in
/// order, and the predicates offered for pushdown.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
}

/// What the engine gets back: the partitioned source to schedule, plus the
/// filters it must re-apply itself because they did not push down.
#[derive(Debug)]
pub struct ScanResult {
    pub partitions: PartitionedSource,
    pub unhandled: Vec<Filter>,
}

/// Coordinator-side collaborators for running a scan.
pub struct CoordinatorEnv<'a> {
    pub database: &'a dyn WarehouseDatabase,
    pub stage: &'a dyn StageStore,
}

/// Run one scan end to end: resolve the schema, translate the request to
/// SQL, execute through the chosen retrieval strategy, and return the
/// partitioned source. The connection lives exactly as long as this call.
pub fn scan(
    env: &CoordinatorEnv<'_>,
    relation: &Relation,
    request: &ScanRequest,
    options: &ScanOptions,
) -> Result<ScanResult> {
    let mut connection = env.database.connect()?;
    let schema = relation.resolve(connection.as_mut())?;
    let policy = options.case_policy();
    let bind = options.bind_variable_enabled;

    let (where_clause, unhandled) =
        filters::translate(&schema, &request.filters, policy, bind);
    if !unhandled.is_empty() {
        tracing::debug!(
            count = unhandled.len(),
            "filters left for the engine to re-apply"
        );
    }

    retrieve::run_session_prologue(connection.as_mut())?;
    retrieve::run_actions(connection.as_mut(), &options.pre_actions)?;

    let partitions = if request.columns.is_empty() {
        count::count_scan(
            connection.as_mut(),
            relation.source(),
            where_clause.as_ref(),
            options,
        )?
    } else {
        let select = build_select(
            relation.source(),
            &request.columns,
            where_clause.as_ref(),
            policy,
            bind,
        )?;
        let strategy = RetrievalStrategy::select(options);
        tracing::info!(
            source = relation.source().display_name(),
            %strategy,
            sql = %select,
            "pushing scan to the warehouse"
        );
        match strategy {
            RetrievalStrategy::BulkUnload => {
                let projected = projected_schema(&schema, &request.columns)?;
                unload::unload_scan(connection.as_mut(), env.stage, &select, projected, options)?
            }
            RetrievalStrategy::DirectFetch => {
                direct::direct_scan(connection.as_mut(), &select, options)?
            }
        }
    };

    retrieve::run_actions(connection.as_mut(), &options.post_actions)?;

    Ok(ScanResult {
        partitions,
        unhandled,
    })
}

/// Append record batches to a warehouse table, truncating first when
/// overwriting. Driver errors propagate unchanged.
pub fn insert(
    database: &dyn WarehouseDatabase,
    table: &TableRef,
    batches: &[RecordBatch],
    overwrite: bool,
) -> Result<u64> {
    let mut connection = database.connect()?;
    if overwrite {
        connection.execute_update(&truncate(table))?;
        tracing::info!(table = %table.full_name(), "truncated before overwrite");
    }
    let rows = connection.ingest(table, batches)?;
    tracing::info!(rows, table = %table.full_name(), "appended records");
    Ok(rows)
}

/// The schema of the projected result, in request order.
fn projected_schema(schema: &SchemaRef, columns: &[String]) -> Result<SchemaRef> {
    let fields = columns
        .iter()
        .map(|column| {
            schema
                .field_with_name(column)
                .map(|field| Arc::new(field.clone()))
                .map_err(|_| {
                    Error::invalid_request(format!("requested column {:?} does not exist", column))
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}
