use std::{env, fs, path::PathBuf};

use querycanvas::{
    format_sql_query, open_session, validate_sql_syntax, QueryCanvasConfig, VisualQuery,
};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: print_sql <schema_dir> <query_json>");
    eprintln!(
        "Example: cargo run --example print_sql -- demos/schema demos/queries/shipped_orders.json"
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let schema_dir = PathBuf::from(args.remove(0));
    let query_path = PathBuf::from(args.remove(0));

    let config = QueryCanvasConfig::load_default();
    let mut session = open_session(schema_dir, &config)?;
    let query: VisualQuery = serde_json::from_str(&fs::read_to_string(query_path)?)?;
    session.load(query);

    for issue in session.validation_report() {
        eprintln!("warning: {issue}");
    }

    let sql = session.sql()?;
    let check = validate_sql_syntax(&sql);
    if let Some(error) = check.error {
        eprintln!("warning: {error}");
    }

    println!("-- {}", session.explanation());
    println!("{}", format_sql_query(&sql, session.dialect()));
    Ok(())
}
