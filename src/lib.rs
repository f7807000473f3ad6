pub mod cli;
pub mod config;
pub mod decode;
pub mod driver;
pub mod error;
pub mod partition;
pub mod retrieve;
pub mod scan;
pub mod schema;
pub mod sql;
pub mod stage;

pub use crate::{
    config::ScanOptions,
    driver::{QueryId, ResultSet, SlicePartition, WarehouseConnection, WarehouseDatabase},
    error::{ContractViolation, DriverError, Error, Result},
    partition::{PartitionDescriptor, PartitionStats, PartitionedSource, StatsReport, WorkerEnv},
    retrieve::RetrievalStrategy,
    scan::{CoordinatorEnv, ScanRequest, ScanResult, insert, scan},
    schema::{CasePolicy, Relation, TableRef, TableSource},
    sql::{Literal, SqlStatement, filters::Filter},
    stage::{InMemoryStage, StageStore},
};
