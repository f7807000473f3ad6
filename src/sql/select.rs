use url::Url;

use crate::{
    decode::StagedFormat,
    error::{Error, Result},
    schema::{CasePolicy, TableRef, TableSource},
    sql::{SqlStatement, SqlWriter, filters::WhereClause},
};

/// Build the SELECT pushed to the warehouse: explicitly quoted columns in
/// request order, the table or parenthesized subquery as FROM, and the
/// translated WHERE when one exists. Deterministic: identical inputs yield
/// byte-identical statements.
pub fn build_select(
    source: &TableSource,
    columns: &[String],
    where_clause: Option<&WhereClause>,
    policy: CasePolicy,
    bind: bool,
) -> Result<SqlStatement> {
    if columns.is_empty() {
        return Err(Error::invalid_request(
            "a SELECT needs at least one column; zero-column scans take the count path",
        ));
    }

    let mut writer = SqlWriter::new(bind);
    writer.sql("SELECT ");
    for (index, column) in columns.iter().enumerate() {
        if index > 0 {
            writer.sql(", ");
        }
        writer.identifier(column, policy);
    }
    writer.sql(" FROM ").sql(source.from_clause());
    append_where(&mut writer, where_clause);
    Ok(writer.finish())
}

/// `SELECT count(*)` over the same source and WHERE, for zero-column scans.
pub fn build_count(
    source: &TableSource,
    where_clause: Option<&WhereClause>,
    bind: bool,
) -> SqlStatement {
    let mut writer = SqlWriter::new(bind);
    writer.sql("SELECT count(*) FROM ").sql(source.from_clause());
    append_where(&mut writer, where_clause);
    writer.finish()
}

fn append_where(writer: &mut SqlWriter, where_clause: Option<&WhereClause>) {
    if let Some(clause) = where_clause {
        writer.sql(" WHERE ").statement(clause.condition());
    }
}

/// Wrap a SELECT in the warehouse's unload command, directing its output to
/// a transient stage location. The inner statement's bound parameters are
/// carried through unchanged.
pub fn build_unload(
    select: &SqlStatement,
    location: &Url,
    format: StagedFormat,
    max_file_bytes: u64,
) -> SqlStatement {
    let mut writer = SqlWriter::new(true);
    writer
        .sql(format!("COPY INTO '{}' FROM (", location))
        .statement(select)
        .sql(") ")
        .sql(match format {
            StagedFormat::Csv => {
                "FILE_FORMAT = (TYPE = CSV COMPRESSION = NONE FIELD_OPTIONALLY_ENCLOSED_BY = '\"') "
            }
            StagedFormat::Json => "FILE_FORMAT = (TYPE = JSON COMPRESSION = NONE) ",
        })
        .sql(format!("MAX_FILE_SIZE = {} OVERWRITE = TRUE", max_file_bytes));
    writer.finish()
}

pub fn truncate(table: &TableRef) -> SqlStatement {
    SqlStatement::raw(format!("TRUNCATE TABLE {}", table.quoted()))
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::sql::{Literal, filters};

    fn source() -> TableSource {
        TableSource::Table(TableRef::qualified("db", "public", "events"))
    }

    #[test]
    fn projection_preserves_order_and_quotes() {
        let statement = build_select(
            &source(),
            &["b".to_string(), "a".to_string()],
            None,
            CasePolicy::Uppercase,
            true,
        )
        .unwrap();
        assert_eq!(
            statement.text(),
            "SELECT \"B\", \"A\" FROM \"db\".\"public\".\"events\""
        );
    }

    #[test]
    fn keep_case_policy_preserves_spelling() {
        let statement = build_select(
            &source(),
            &["MyCol".to_string()],
            None,
            CasePolicy::KeepCase,
            true,
        )
        .unwrap();
        assert_eq!(
            statement.text(),
            "SELECT \"MyCol\" FROM \"db\".\"public\".\"events\""
        );
    }

    #[test]
    fn empty_projection_is_invalid() {
        let result = build_select(&source(), &[], None, CasePolicy::Uppercase, true);
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn where_clause_appended_with_params() {
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, false)]);
        let (clause, _) = filters::translate(
            &schema,
            &[filters::Filter::Gt {
                column: "id".to_string(),
                value: Literal::Int(5),
            }],
            CasePolicy::Uppercase,
            true,
        );
        let statement = build_select(
            &source(),
            &["id".to_string()],
            clause.as_ref(),
            CasePolicy::Uppercase,
            true,
        )
        .unwrap();
        assert_eq!(
            statement.text(),
            "SELECT \"ID\" FROM \"db\".\"public\".\"events\" WHERE (\"ID\" > ?)"
        );
        assert_eq!(statement.params(), &[Literal::Int(5)]);
    }

    #[test]
    fn builder_is_idempotent() {
        let columns = vec!["x".to_string(), "y".to_string()];
        let first = build_select(&source(), &columns, None, CasePolicy::Uppercase, true).unwrap();
        let second = build_select(&source(), &columns, None, CasePolicy::Uppercase, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn count_statement_over_subquery() {
        let source = TableSource::Subquery("SELECT id FROM base".to_string());
        let statement = build_count(&source, None, true);
        assert_eq!(
            statement.text(),
            "SELECT count(*) FROM (SELECT id FROM base)"
        );
    }

    #[test]
    fn unload_wraps_select_and_carries_params() {
        let schema = Schema::new(vec![Field::new("id", DataType::Int64, false)]);
        let (clause, _) = filters::translate(
            &schema,
            &[filters::Filter::Eq {
                column: "id".to_string(),
                value: Literal::Int(1),
            }],
            CasePolicy::Uppercase,
            true,
        );
        let select = build_select(
            &source(),
            &["id".to_string()],
            clause.as_ref(),
            CasePolicy::Uppercase,
            true,
        )
        .unwrap();
        let location = Url::parse("s3://bucket/stage/scan-1/").unwrap();
        let unload = build_unload(&select, &location, StagedFormat::Csv, 16_000_000);
        assert!(unload.text().starts_with("COPY INTO 's3://bucket/stage/scan-1/' FROM (SELECT"));
        assert!(unload.text().contains("TYPE = CSV"));
        assert!(unload.text().ends_with("MAX_FILE_SIZE = 16000000 OVERWRITE = TRUE"));
        assert_eq!(unload.params(), &[Literal::Int(1)]);
    }
}
