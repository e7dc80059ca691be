use clap::ValueEnum;
use sea_orm::DatabaseConnection;

use celestine::SyncStateModel;
use celestine::repository::sync_state;

/// Output format for checkpoint display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// One stored checkpoint for display.
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct CheckpointDisplay {
    #[tabled(rename = "Job")]
    pub name: String,
    #[tabled(rename = "Position")]
    pub position: i64,
    #[tabled(rename = "Updated At")]
    pub updated_at: String,
}

impl From<SyncStateModel> for CheckpointDisplay {
    fn from(model: SyncStateModel) -> Self {
        Self {
            name: model.name,
            position: model.position,
            updated_at: model
                .updated_at
                .to_utc()
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        }
    }
}

pub(crate) async fn handle_checkpoints(
    db: &DatabaseConnection,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let items: Vec<CheckpointDisplay> = sync_state::list(db)
        .await?
        .into_iter()
        .map(CheckpointDisplay::from)
        .collect();

    match output {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No checkpoints stored yet.");
                return Ok(());
            }
            let mut table = tabled::Table::new(items);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    Ok(())
}
