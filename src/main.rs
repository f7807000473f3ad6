use arrow::datatypes::Schema;
use clap::Parser;
use frostdbc::{
    Error, Result, ScanOptions,
    cli::{EntryPoint, parse_columns, parse_filter},
    decode::StagedFormat,
    retrieve::RetrievalStrategy,
    schema::{TableRef, TableSource},
    sql::{
        filters,
        select::{build_count, build_select},
    },
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frostdbc=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(match main_inner() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err}");
            eprintln!("For more help, run: frostdbc --help");
            1
        }
    });
}

fn main_inner() -> Result<()> {
    let EntryPoint {
        table,
        query,
        columns,
        selects,
        filters: filter_args,
        config,
    } = EntryPoint::parse();

    let options = match config {
        Some(path) => ScanOptions::load(&path)?,
        None => ScanOptions::default(),
    };

    let source = match (table, query) {
        (Some(table), None) => TableSource::Table(parse_table(&table)?),
        (None, Some(sql)) => TableSource::Subquery(sql),
        _ => {
            return Err(Error::invalid_request(
                "exactly one of --table or --query is required",
            ));
        }
    };

    let schema = Schema::new(parse_columns(&columns)?);
    let requested = filter_args
        .iter()
        .map(|expression| parse_filter(expression))
        .collect::<Result<Vec<_>>>()?;

    for field in schema.fields() {
        let mapped = frostdbc::schema::warehouse_type(field)?;
        println!("column:    {} {}", field.name(), mapped.sql());
    }

    let policy = options.case_policy();
    let bind = options.bind_variable_enabled;
    let (where_clause, unhandled) = filters::translate(&schema, &requested, policy, bind);

    if selects.is_empty() {
        let statement = build_count(&source, where_clause.as_ref(), bind);
        println!("path:      count-only ({} partitions)", options.count_partitions);
        println!("sql:       {}", statement.text());
        print_params(statement.params());
    } else {
        let statement = build_select(&source, &selects, where_clause.as_ref(), policy, bind)?;
        let strategy = RetrievalStrategy::select(&options);
        println!("strategy:  {}", strategy);
        if strategy == RetrievalStrategy::BulkUnload {
            println!("format:    {}", StagedFormat::for_schema(&schema));
            println!("stage:     {}", options.stage_location()?);
        }
        println!("sql:       {}", statement.text());
        print_params(statement.params());
    }

    if !unhandled.is_empty() {
        println!("unhandled: {} filter(s) left for the engine", unhandled.len());
        for filter in &unhandled {
            println!("  {:?}", filter);
        }
    }

    Ok(())
}

fn print_params(params: &[frostdbc::sql::Literal]) {
    if !params.is_empty() {
        println!(
            "params:    [{}]",
            params
                .iter()
                .map(|p| p.to_sql())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

fn parse_table(dotted: &str) -> Result<TableRef> {
    let parts: Vec<&str> = dotted.split('.').collect();
    match parts.as_slice() {
        [table] => Ok(TableRef::new(*table)),
        [schema, table] => Ok(TableRef {
            database: None,
            schema: Some(schema.to_string()),
            table: table.to_string(),
        }),
        [database, schema, table] => Ok(TableRef::qualified(*database, *schema, *table)),
        _ => Err(Error::invalid_request(format!(
            "table {:?} has too many components",
            dotted
        ))),
    }
}
