use jobagent::{
    config::{get_config, init_config, RunConfig},
    database::pool::create_pool,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    let app_state = AppState::new(pool);

    // The orchestration runtime normally injects RUN_NAME; standalone
    // invocations get a generated one.
    let run_name = config
        .run_name
        .clone()
        .unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4()));
    let run = RunConfig::from_config(config);

    let report = app_state.pipeline_service.run(&run, &run_name).await?;

    info!(
        "Run {} finished: {} selected, {} evaluated ({} scoring failures), {} persisted, {} notified ({} notify failures)",
        report.run_name,
        report.selected,
        report.evaluated,
        report.scoring_failures,
        report.persisted,
        report.notified,
        report.notify_failures,
    );

    Ok(())
}
