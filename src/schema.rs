use std::sync::OnceLock;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::{
    driver::WarehouseConnection,
    error::{Result, SchemaError},
};

/// Field metadata key carrying an explicit warehouse type annotation, e.g.
/// a string column that actually holds semi-structured data.
pub const WAREHOUSE_TYPE_KEY: &str = "warehouse_type";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        TableRef {
            database: None,
            schema: None,
            table: table.into(),
        }
    }

    pub fn qualified(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        TableRef {
            database: Some(database.into()),
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Unquoted dotted name, for logs and error messages.
    pub fn full_name(&self) -> String {
        self.parts().collect::<Vec<_>>().join(".")
    }

    /// Quoted dotted name as it appears in generated SQL. Table identifiers
    /// always keep their original case.
    pub fn quoted(&self) -> String {
        self.parts()
            .map(|part| quote_identifier(part, CasePolicy::KeepCase))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn parts(&self) -> impl Iterator<Item = &str> {
        self.database
            .as_deref()
            .into_iter()
            .chain(self.schema.as_deref())
            .chain(std::iter::once(self.table.as_str()))
    }
}

/// What a scan reads from: a warehouse table or an arbitrary subquery
/// supplied by the caller. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableSource {
    Table(TableRef),
    Subquery(String),
}

impl TableSource {
    pub fn from_clause(&self) -> String {
        match self {
            TableSource::Table(table) => table.quoted(),
            TableSource::Subquery(text) => format!("({})", text),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            TableSource::Table(table) => table.full_name(),
            TableSource::Subquery(_) => "<subquery>".to_string(),
        }
    }
}

/// How requested column names become quoted SQL identifiers. The warehouse
/// folds unquoted identifiers to upper case, so the default policy
/// uppercases before quoting; `KeepCase` preserves the caller's spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePolicy {
    KeepCase,
    Uppercase,
}

pub fn quote_identifier(identifier: &str, policy: CasePolicy) -> String {
    let name = match policy {
        CasePolicy::KeepCase => identifier.to_string(),
        CasePolicy::Uppercase => identifier.to_uppercase(),
    };
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Warehouse-side semantic type of a column. `Variant` marks
/// semi-structured data, which forces the JSON unload format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseType {
    Boolean,
    Number { precision: u8, scale: i8 },
    Double,
    Text,
    Binary,
    Date,
    Time,
    TimestampNtz,
    TimestampTz,
    Variant,
}

impl WarehouseType {
    pub fn sql(&self) -> String {
        use WarehouseType::*;
        match self {
            Boolean => "BOOLEAN".to_string(),
            Number { precision, scale } => format!("NUMBER({},{})", precision, scale),
            Double => "DOUBLE".to_string(),
            Text => "VARCHAR".to_string(),
            Binary => "BINARY".to_string(),
            Date => "DATE".to_string(),
            Time => "TIME".to_string(),
            TimestampNtz => "TIMESTAMP_NTZ".to_string(),
            TimestampTz => "TIMESTAMP_TZ".to_string(),
            Variant => "VARIANT".to_string(),
        }
    }

    pub fn is_variant(&self) -> bool {
        matches!(self, WarehouseType::Variant)
    }
}

/// Map an Arrow field to its warehouse type. Complex types become VARIANT;
/// an explicit [`WAREHOUSE_TYPE_KEY`] annotation overrides the mapping.
pub fn warehouse_type(field: &Field) -> Result<WarehouseType> {
    if let Some(annotation) = field.metadata().get(WAREHOUSE_TYPE_KEY) {
        return match annotation.to_lowercase().as_str() {
            "variant" => Ok(WarehouseType::Variant),
            _ => Err(SchemaError::UnknownAnnotation {
                column: field.name().clone(),
                annotation: annotation.clone(),
            }
            .into()),
        };
    }

    use WarehouseType::*;
    let mapped = match field.data_type() {
        DataType::Boolean => Boolean,
        DataType::Int8 | DataType::Int16 | DataType::Int32 => Number {
            precision: 10,
            scale: 0,
        },
        DataType::Int64 | DataType::UInt64 => Number {
            precision: 38,
            scale: 0,
        },
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => Number {
            precision: 10,
            scale: 0,
        },
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Double,
        DataType::Utf8 | DataType::LargeUtf8 => Text,
        DataType::Binary | DataType::LargeBinary | DataType::FixedSizeBinary(_) => Binary,
        DataType::Date32 | DataType::Date64 => Date,
        DataType::Time32(_) | DataType::Time64(_) => Time,
        DataType::Timestamp(_, None) => TimestampNtz,
        DataType::Timestamp(_, Some(_)) => TimestampTz,
        DataType::Decimal128(precision, scale) | DataType::Decimal256(precision, scale) => {
            Number {
                precision: *precision,
                scale: *scale,
            }
        }
        DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(_, _)
        | DataType::Struct(_)
        | DataType::Map(_, _)
        | DataType::Union(_, _) => Variant,
        other => {
            return Err(SchemaError::UnsupportedType {
                column: field.name().clone(),
                datatype: other.to_string(),
            }
            .into());
        }
    };
    Ok(mapped)
}

pub fn has_variant_column(schema: &Schema) -> bool {
    schema
        .fields()
        .iter()
        .any(|field| warehouse_type(field).map(|t| t.is_variant()).unwrap_or(false))
}

/// A scan target with its schema resolved at most once. The schema is
/// either supplied by the caller or discovered through the connection on
/// first use; later resolutions reuse the cached value.
#[derive(Debug)]
pub struct Relation {
    source: TableSource,
    schema: OnceLock<SchemaRef>,
}

impl Relation {
    pub fn new(source: TableSource) -> Self {
        Relation {
            source,
            schema: OnceLock::new(),
        }
    }

    pub fn with_schema(source: TableSource, schema: SchemaRef) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(schema);
        Relation {
            source,
            schema: cell,
        }
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    pub fn resolve(&self, connection: &mut dyn WarehouseConnection) -> Result<SchemaRef> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema.clone());
        }
        let discovered = connection.table_schema(&self.source)?;
        Ok(self.schema.get_or_init(|| discovered).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use arrow::datatypes::{DataType, Field, Fields, Schema, TimeUnit};

    use super::*;

    #[test]
    fn table_ref_quoting_keeps_case() {
        let table = TableRef::qualified("db", "public", "Events");
        assert_eq!(table.full_name(), "db.public.Events");
        assert_eq!(table.quoted(), "\"db\".\"public\".\"Events\"");
    }

    #[test]
    fn subquery_from_clause_is_parenthesized() {
        let source = TableSource::Subquery("SELECT 1 AS x".to_string());
        assert_eq!(source.from_clause(), "(SELECT 1 AS x)");
    }

    #[test]
    fn identifier_case_policies() {
        assert_eq!(quote_identifier("MyCol", CasePolicy::KeepCase), "\"MyCol\"");
        assert_eq!(quote_identifier("MyCol", CasePolicy::Uppercase), "\"MYCOL\"");
        assert_eq!(
            quote_identifier("we\"ird", CasePolicy::KeepCase),
            "\"we\"\"ird\""
        );
    }

    #[test]
    fn complex_types_map_to_variant() {
        let field = Field::new(
            "payload",
            DataType::Struct(Fields::from(vec![Field::new("a", DataType::Int64, true)])),
            true,
        );
        assert_eq!(warehouse_type(&field).unwrap(), WarehouseType::Variant);
    }

    #[test]
    fn metadata_annotation_overrides_mapping() {
        let field = Field::new("raw", DataType::Utf8, true).with_metadata(HashMap::from([(
            WAREHOUSE_TYPE_KEY.to_string(),
            "variant".to_string(),
        )]));
        assert_eq!(warehouse_type(&field).unwrap(), WarehouseType::Variant);
    }

    #[test]
    fn timestamp_mapping_tracks_timezone() {
        let ntz = Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            true,
        );
        let tz = Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            true,
        );
        assert_eq!(warehouse_type(&ntz).unwrap(), WarehouseType::TimestampNtz);
        assert_eq!(warehouse_type(&tz).unwrap(), WarehouseType::TimestampTz);
    }

    #[test]
    fn variant_detection_over_schema() {
        let plain = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        assert!(!has_variant_column(&plain));

        let nested = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new(
                "tags",
                DataType::List(Field::new("item", DataType::Utf8, true).into()),
                true,
            ),
        ]);
        assert!(has_variant_column(&nested));
    }
}
