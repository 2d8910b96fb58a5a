use crate::cli::utils::{open_database, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub async fn handle(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = open_database(config).await?;
    let result = db.migrate().await;
    db.close().await;
    result?;

    output_success(output_format, "Migrations applied", None)
}
