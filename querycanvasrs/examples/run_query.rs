use std::sync::Arc;

use querycanvas::{
    models::{JoinCondition, JoinOperator, SelectedColumn},
    to_csv, ConnectionDescriptor, DatabaseType, QueryCanvasConfig, QueryHistory, QueryRunner,
    QuerySession, SchemaCatalog, SimulatedExecutor,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = QueryCanvasConfig::load_default();
    let catalog = SchemaCatalog::load_from_dir("demos/schema")?;
    let mut session = QuerySession::new(Arc::new(catalog), &config);

    let users = session.tables_mut().add_table_by_name("users")?;
    let orders = session.tables_mut().add_table_by_name("orders")?;
    let join = session.add_join()?;
    session
        .joins_mut()
        .set_tables(join.id, Some(users.id), Some(orders.id))?;
    let idx = session.joins_mut().add_condition(join.id)?;
    session.joins_mut().update_condition(
        join.id,
        idx,
        JoinCondition::new("id", JoinOperator::Eq, "user_id"),
    )?;
    let status = session.conditions_mut().add_condition();
    session
        .conditions_mut()
        .set_column(status.id, "orders.status")?;
    session.conditions_mut().set_value(status.id, "'shipped'")?;
    session.set_select_columns(vec![
        SelectedColumn::of("users", "name"),
        SelectedColumn::of("orders", "total"),
    ]);

    let sql = session.sql()?;
    println!("{sql}\n");

    let connection = ConnectionDescriptor::new(
        "demo",
        DatabaseType::Postgresql,
        "postgres://localhost:5432/shop",
    );
    let executor = SimulatedExecutor::new(&config.executor);
    let runner = QueryRunner::new(&config.executor);
    let mut history = QueryHistory::new(&config.history);

    let result = runner.run(&sql, &executor, &connection, &mut history).await?;
    match &result.error {
        Some(error) => println!("failed: {error}"),
        None => println!("{}", to_csv(&result)),
    }

    let stats = history.stats();
    println!(
        "\n{} run(s), {} ok, avg {} ms",
        stats.total, stats.successful, stats.avg_execution_time
    );
    Ok(())
}
