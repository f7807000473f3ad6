use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Cursor,
};

use arrow::{
    datatypes::{Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::schema::has_variant_column;

/// The format the warehouse unloads staged files in. Semi-structured
/// columns cannot round-trip through CSV, so any variant column forces
/// newline-delimited JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StagedFormat {
    Csv,
    Json,
}

impl StagedFormat {
    pub fn for_schema(schema: &Schema) -> Self {
        if has_variant_column(schema) {
            StagedFormat::Json
        } else {
            StagedFormat::Csv
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StagedFormat::Csv => "csv",
            StagedFormat::Json => "json",
        }
    }
}

impl Display for StagedFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// Decode one staged file's bytes against the resolved schema. Unloaded
/// CSV carries no header row.
pub fn decode_batches(
    format: StagedFormat,
    schema: &SchemaRef,
    bytes: &Bytes,
) -> Result<Vec<RecordBatch>, ArrowError> {
    match format {
        StagedFormat::Csv => {
            let reader = arrow::csv::ReaderBuilder::new(schema.clone())
                .with_header(false)
                .build(Cursor::new(bytes.as_ref()))?;
            reader.collect()
        }
        StagedFormat::Json => {
            let reader = arrow::json::ReaderBuilder::new(schema.clone())
                .build(Cursor::new(bytes.as_ref()))?;
            reader.collect()
        }
    }
}
