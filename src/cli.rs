use arrow::datatypes::{DataType, Field, TimeUnit};
use clap::Parser;

use crate::{
    error::{Error, Result},
    sql::{Literal, filters::Filter},
};

const LONG_ABOUT: &str = r#"frostdbc - warehouse pushdown explainer

frostdbc translates a logical scan into the SQL a warehouse scan would push
down, without connecting to anything. Given the column layout of the source
it prints the chosen retrieval strategy, the unload format, the generated
statement with its bound parameters, and the predicates that would be left
for the engine to re-apply.

USAGE EXAMPLES:
  # Explain a filtered projection over a table
  frostdbc \
    --table analytics.public.events \
    --columns "id:bigint,name:text,payload:variant" \
    --select id --select name \
    --filter "id > 100" --filter "name startswith a"

  # Explain a count-only scan over a subquery
  frostdbc \
    --query "SELECT * FROM events WHERE kind = 'click'" \
    --columns "id:bigint" \
    --config ./scan.toml

CONFIGURATION:
  --config points to a TOML file using the same option names the engine
  passes at runtime: useCopyUnload, keepOriginalColumnNameCase,
  expectedPartitionSize, bindVariableEnabled, stageLocation, ...
"#;

/// Explain the SQL pushdown for a warehouse scan
#[derive(Debug, Parser)]
#[command(
    version,
    about = "Explain the SQL pushdown for a warehouse scan",
    long_about = LONG_ABOUT
)]
pub struct EntryPoint {
    /// Source table, dotted: TABLE, SCHEMA.TABLE or DATABASE.SCHEMA.TABLE
    #[arg(long, short = 't', value_name = "TABLE", conflicts_with = "query")]
    pub table: Option<String>,

    /// Source subquery text, used verbatim as the FROM clause
    #[arg(long, short = 'q', value_name = "SQL")]
    pub query: Option<String>,

    /// Column layout of the source: comma-separated "name:type" pairs
    ///
    /// Types: bool, int, bigint, float, text, binary, date, timestamp,
    /// timestamptz, variant
    #[arg(long, value_name = "COLS")]
    pub columns: String,

    /// Column to project; repeat for more. None selects the count path.
    #[arg(long = "select", value_name = "COLUMN")]
    pub selects: Vec<String>,

    /// Predicate to push, e.g. "id > 10", "name = alice", "name isnull",
    /// "name startswith pre"; repeat for more
    #[arg(long = "filter", value_name = "EXPR")]
    pub filters: Vec<String>,

    /// Path to a TOML file of scan options
    #[arg(long, env = "FROSTDBC_CONFIG", value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,
}

/// Parse the "name:type,..." column layout into Arrow fields.
pub fn parse_columns(layout: &str) -> Result<Vec<Field>> {
    layout
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (name, type_name) = part.split_once(':').ok_or_else(|| {
                Error::invalid_request(format!("column {:?} is not name:type", part))
            })?;
            let data_type = match type_name.trim().to_lowercase().as_str() {
                "bool" | "boolean" => DataType::Boolean,
                "int" | "integer" => DataType::Int32,
                "bigint" | "long" => DataType::Int64,
                "float" | "double" => DataType::Float64,
                "text" | "string" | "varchar" => DataType::Utf8,
                "binary" => DataType::Binary,
                "date" => DataType::Date32,
                "timestamp" => DataType::Timestamp(TimeUnit::Microsecond, None),
                "timestamptz" => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                "variant" => {
                    let field = Field::new(name.trim(), DataType::Utf8, true).with_metadata(
                        [(
                            crate::schema::WAREHOUSE_TYPE_KEY.to_string(),
                            "variant".to_string(),
                        )]
                        .into(),
                    );
                    return Ok(field);
                }
                other => {
                    return Err(Error::invalid_request(format!(
                        "unknown column type {:?}",
                        other
                    )));
                }
            };
            Ok(Field::new(name.trim(), data_type, true))
        })
        .collect()
}

/// Parse one "--filter" expression: `column op value`, or the unary forms
/// `column isnull` / `column isnotnull`.
pub fn parse_filter(expression: &str) -> Result<Filter> {
    let mut parts = expression.splitn(3, char::is_whitespace);
    let column = parts
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::invalid_request("empty filter expression"))?
        .to_string();
    let operator = parts
        .next()
        .ok_or_else(|| Error::invalid_request(format!("filter {:?} has no operator", expression)))?
        .to_lowercase();

    match operator.as_str() {
        "isnull" => return Ok(Filter::IsNull { column }),
        "isnotnull" => return Ok(Filter::IsNotNull { column }),
        _ => {}
    }

    let value = parts.next().ok_or_else(|| {
        Error::invalid_request(format!("filter {:?} has no value", expression))
    })?;

    let filter = match operator.as_str() {
        "=" | "==" => Filter::Eq {
            column,
            value: parse_literal(value),
        },
        "!=" | "<>" => Filter::Ne {
            column,
            value: parse_literal(value),
        },
        ">" => Filter::Gt {
            column,
            value: parse_literal(value),
        },
        ">=" => Filter::GtEq {
            column,
            value: parse_literal(value),
        },
        "<" => Filter::Lt {
            column,
            value: parse_literal(value),
        },
        "<=" => Filter::LtEq {
            column,
            value: parse_literal(value),
        },
        "startswith" => Filter::StartsWith {
            column,
            prefix: value.to_string(),
        },
        "endswith" => Filter::EndsWith {
            column,
            suffix: value.to_string(),
        },
        "contains" => Filter::Contains {
            column,
            infix: value.to_string(),
        },
        other => {
            return Err(Error::invalid_request(format!(
                "unknown filter operator {:?}",
                other
            )));
        }
    };
    Ok(filter)
}

fn parse_literal(value: &str) -> Literal {
    if let Ok(int) = value.parse::<i64>() {
        return Literal::Int(int);
    }
    if let Ok(float) = value.parse::<f64>() {
        return Literal::Float(float);
    }
    match value {
        "true" | "TRUE" => Literal::Boolean(true),
        "false" | "FALSE" => Literal::Boolean(false),
        "null" | "NULL" => Literal::Null,
        other => Literal::Str(other.trim_matches('\'').to_string()),
    }
}
