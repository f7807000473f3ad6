use arrow::datatypes::Schema;
use itertools::Itertools;

use crate::{
    schema::CasePolicy,
    sql::{Literal, SqlStatement, SqlWriter},
};

/// A pushdown predicate over a single scan, as handed over by the engine.
/// Closed set: anything the engine cannot express in these shapes never
/// reaches the translator.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Literal },
    Ne { column: String, value: Literal },
    Gt { column: String, value: Literal },
    GtEq { column: String, value: Literal },
    Lt { column: String, value: Literal },
    LtEq { column: String, value: Literal },
    IsNull { column: String },
    IsNotNull { column: String },
    StartsWith { column: String, prefix: String },
    EndsWith { column: String, suffix: String },
    Contains { column: String, infix: String },
    In { column: String, values: Vec<Literal> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

/// The translated conjunction of every pushable filter.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    condition: SqlStatement,
}

impl WhereClause {
    pub fn condition(&self) -> &SqlStatement {
        &self.condition
    }
}

/// Translate filters into a WHERE conjunction. Filters that cannot be
/// pushed down, because they name a column absent from the schema or have
/// an untranslatable shape, are returned for the caller to re-apply; they
/// are never an error. Composites push down only when all children do.
pub fn translate(
    schema: &Schema,
    filters: &[Filter],
    policy: CasePolicy,
    bind: bool,
) -> (Option<WhereClause>, Vec<Filter>) {
    let mut writer = SqlWriter::new(bind);
    let mut unhandled = Vec::new();
    let mut pushed = 0usize;

    for filter in filters {
        match render(filter, schema, policy, bind) {
            Some(rendered) => {
                if pushed > 0 {
                    writer.sql(" AND ");
                }
                writer.sql("(").merge(rendered).sql(")");
                pushed += 1;
            }
            None => unhandled.push(filter.clone()),
        }
    }

    let clause = (pushed > 0).then(|| WhereClause {
        condition: writer.finish(),
    });
    (clause, unhandled)
}

/// Render one filter into a fresh writer, or `None` if it cannot be pushed.
/// Rendering into a throwaway writer keeps a failed child from leaving
/// partial fragments behind.
fn render(filter: &Filter, schema: &Schema, policy: CasePolicy, bind: bool) -> Option<SqlWriter> {
    use Filter::*;

    let mut writer = SqlWriter::new(bind);
    match filter {
        Eq { column, value } => comparison(&mut writer, schema, policy, column, "=", value)?,
        Ne { column, value } => comparison(&mut writer, schema, policy, column, "!=", value)?,
        Gt { column, value } => comparison(&mut writer, schema, policy, column, ">", value)?,
        GtEq { column, value } => comparison(&mut writer, schema, policy, column, ">=", value)?,
        Lt { column, value } => comparison(&mut writer, schema, policy, column, "<", value)?,
        LtEq { column, value } => comparison(&mut writer, schema, policy, column, "<=", value)?,
        IsNull { column } => {
            column_ref(&mut writer, schema, policy, column)?;
            writer.sql(" IS NULL");
        }
        IsNotNull { column } => {
            column_ref(&mut writer, schema, policy, column)?;
            writer.sql(" IS NOT NULL");
        }
        StartsWith { column, prefix } => {
            like(&mut writer, schema, policy, column, format!("{}%", escape_like(prefix)))?;
        }
        EndsWith { column, suffix } => {
            like(&mut writer, schema, policy, column, format!("%{}", escape_like(suffix)))?;
        }
        Contains { column, infix } => {
            like(&mut writer, schema, policy, column, format!("%{}%", escape_like(infix)))?;
        }
        In { column, values } => {
            // An empty IN list has no SQL spelling.
            if values.is_empty() || values.iter().any(Literal::is_null) {
                return None;
            }
            column_ref(&mut writer, schema, policy, column)?;
            writer.sql(" IN (");
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    writer.sql(", ");
                }
                writer.literal(value.clone());
            }
            writer.sql(")");
        }
        And(children) => {
            composite(&mut writer, schema, policy, bind, children, " AND ")?;
        }
        Or(children) => {
            composite(&mut writer, schema, policy, bind, children, " OR ")?;
        }
        Not(child) => {
            let inner = render(child, schema, policy, bind)?;
            writer.sql("NOT (").merge(inner).sql(")");
        }
    }
    Some(writer)
}

fn column_ref(
    writer: &mut SqlWriter,
    schema: &Schema,
    policy: CasePolicy,
    column: &str,
) -> Option<()> {
    schema.field_with_name(column).ok()?;
    writer.identifier(column, policy);
    Some(())
}

fn comparison(
    writer: &mut SqlWriter,
    schema: &Schema,
    policy: CasePolicy,
    column: &str,
    operator: &str,
    value: &Literal,
) -> Option<()> {
    // Null compares to nothing; the engine re-applies these itself.
    if value.is_null() {
        return None;
    }
    column_ref(writer, schema, policy, column)?;
    writer.sql(format!(" {} ", operator)).literal(value.clone());
    Some(())
}

fn like(
    writer: &mut SqlWriter,
    schema: &Schema,
    policy: CasePolicy,
    column: &str,
    pattern: String,
) -> Option<()> {
    column_ref(writer, schema, policy, column)?;
    writer
        .sql(" LIKE ")
        .literal(Literal::Str(pattern))
        .sql(" ESCAPE '\\'");
    Some(())
}

fn composite(
    writer: &mut SqlWriter,
    schema: &Schema,
    policy: CasePolicy,
    bind: bool,
    children: &[Filter],
    joiner: &str,
) -> Option<()> {
    if children.is_empty() {
        return None;
    }
    let rendered: Vec<SqlWriter> = children
        .iter()
        .map(|child| render(child, schema, policy, bind))
        .collect::<Option<_>>()?;
    for (index, child) in rendered.into_iter().enumerate() {
        if index > 0 {
            writer.sql(joiner);
        }
        writer.sql("(").merge(child).sql(")");
    }
    Some(())
}

/// Escape LIKE wildcards in a user value so it matches literally.
fn escape_like(value: &str) -> String {
    value
        .chars()
        .flat_map(|c| match c {
            '\\' | '%' | '_' => vec!['\\', c],
            _ => vec![c],
        })
        .join("")
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field};

    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ])
    }

    fn where_text(filters: &[Filter]) -> (Option<String>, Vec<Filter>) {
        let (clause, unhandled) = translate(&schema(), filters, CasePolicy::Uppercase, false);
        (clause.map(|c| c.condition().text()), unhandled)
    }

    #[test]
    fn comparison_kinds_push_down() {
        let (text, unhandled) = where_text(&[
            Filter::Eq {
                column: "id".to_string(),
                value: Literal::Int(3),
            },
            Filter::Lt {
                column: "score".to_string(),
                value: Literal::Float(0.5),
            },
        ]);
        assert_eq!(text.as_deref(), Some("(\"ID\" = 3) AND (\"SCORE\" < 0.5)"));
        assert!(unhandled.is_empty());
    }

    #[test]
    fn unknown_column_is_reported_not_fatal() {
        let filter = Filter::Eq {
            column: "missing".to_string(),
            value: Literal::Int(1),
        };
        let (text, unhandled) = where_text(std::slice::from_ref(&filter));
        assert_eq!(text, None);
        assert_eq!(unhandled, vec![filter]);
    }

    #[test]
    fn null_comparison_is_unhandled() {
        let filter = Filter::Eq {
            column: "name".to_string(),
            value: Literal::Null,
        };
        let (text, unhandled) = where_text(std::slice::from_ref(&filter));
        assert_eq!(text, None);
        assert_eq!(unhandled.len(), 1);
    }

    #[test]
    fn null_checks_and_string_matching() {
        let (text, unhandled) = where_text(&[
            Filter::IsNull {
                column: "name".to_string(),
            },
            Filter::StartsWith {
                column: "name".to_string(),
                prefix: "a_b".to_string(),
            },
        ]);
        assert_eq!(
            text.as_deref(),
            Some("(\"NAME\" IS NULL) AND (\"NAME\" LIKE 'a\\_b%' ESCAPE '\\')")
        );
        assert!(unhandled.is_empty());
    }

    #[test]
    fn in_list_pushes_down_but_empty_list_does_not() {
        let (text, unhandled) = where_text(&[Filter::In {
            column: "id".to_string(),
            values: vec![Literal::Int(1), Literal::Int(2)],
        }]);
        assert_eq!(text.as_deref(), Some("(\"ID\" IN (1, 2))"));
        assert!(unhandled.is_empty());

        let empty = Filter::In {
            column: "id".to_string(),
            values: vec![],
        };
        let (text, unhandled) = where_text(std::slice::from_ref(&empty));
        assert_eq!(text, None);
        assert_eq!(unhandled, vec![empty]);
    }

    #[test]
    fn composite_is_all_or_nothing() {
        let pushable = Filter::Or(vec![
            Filter::Eq {
                column: "id".to_string(),
                value: Literal::Int(1),
            },
            Filter::IsNotNull {
                column: "name".to_string(),
            },
        ]);
        let (text, unhandled) = where_text(std::slice::from_ref(&pushable));
        assert_eq!(
            text.as_deref(),
            Some("((\"ID\" = 1) OR (\"NAME\" IS NOT NULL))")
        );
        assert!(unhandled.is_empty());

        let mixed = Filter::Or(vec![
            Filter::Eq {
                column: "id".to_string(),
                value: Literal::Int(1),
            },
            Filter::Eq {
                column: "missing".to_string(),
                value: Literal::Int(2),
            },
        ]);
        let (text, unhandled) = where_text(std::slice::from_ref(&mixed));
        assert_eq!(text, None);
        assert_eq!(unhandled, vec![mixed]);
    }

    #[test]
    fn negation_wraps_child() {
        let (text, _) = where_text(&[Filter::Not(Box::new(Filter::Eq {
            column: "id".to_string(),
            value: Literal::Int(9),
        }))]);
        assert_eq!(text.as_deref(), Some("(NOT (\"ID\" = 9))"));
    }

    #[test]
    fn bound_mode_produces_ordered_params() {
        let (clause, unhandled) = translate(
            &schema(),
            &[
                Filter::Gt {
                    column: "id".to_string(),
                    value: Literal::Int(10),
                },
                Filter::Eq {
                    column: "name".to_string(),
                    value: Literal::Str("x".to_string()),
                },
            ],
            CasePolicy::Uppercase,
            true,
        );
        assert!(unhandled.is_empty());
        let clause = clause.unwrap();
        assert_eq!(
            clause.condition().text(),
            "(\"ID\" > ?) AND (\"NAME\" = ?)"
        );
        assert_eq!(
            clause.condition().params(),
            &[Literal::Int(10), Literal::Str("x".to_string())]
        );
    }
}
