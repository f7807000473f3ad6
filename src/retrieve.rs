use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::{
    config::ScanOptions,
    driver::WarehouseConnection,
    error::Result,
    sql::SqlStatement,
};

pub mod count;
pub mod direct;
pub mod unload;

/// Session settings applied before every scan so unloaded text and sliced
/// results decode the same way everywhere.
const SESSION_PROLOGUE: &[&str] = &[
    "ALTER SESSION SET TIMEZONE = 'UTC'",
    "ALTER SESSION SET TIMESTAMP_OUTPUT_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF9 TZHTZM'",
];

/// How result rows travel from the warehouse to the workers. Chosen once
/// per scan from `useCopyUnload`; never switched mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    BulkUnload,
    DirectFetch,
}

impl RetrievalStrategy {
    pub fn select(options: &ScanOptions) -> Self {
        if options.use_copy_unload {
            RetrievalStrategy::BulkUnload
        } else {
            RetrievalStrategy::DirectFetch
        }
    }
}

impl Display for RetrievalStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            RetrievalStrategy::BulkUnload => "bulk-unload",
            RetrievalStrategy::DirectFetch => "direct-fetch",
        })
    }
}

pub(crate) fn run_session_prologue(connection: &mut dyn WarehouseConnection) -> Result<()> {
    for statement in SESSION_PROLOGUE {
        connection.execute_update(&SqlStatement::raw(*statement))?;
    }
    Ok(())
}

pub(crate) fn run_actions(
    connection: &mut dyn WarehouseConnection,
    actions: &[String],
) -> Result<()> {
    for action in actions {
        tracing::debug!(action, "running scan action");
        connection.execute_update(&SqlStatement::raw(action.clone()))?;
    }
    Ok(())
}
