use clap::Subcommand;
use serde_json::json;

use crate::auth::PasswordHasher;
use crate::cli::utils::{open_database, output_empty_collection, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::PgStore;
use crate::models::{Exercise, ExerciseFilter};
use crate::services::ExerciseService;

#[derive(Subcommand)]
pub enum ExerciseCommands {
    #[command(about = "Add an exercise to the catalog")]
    Add {
        #[arg(help = "Unique exercise name")]
        name: String,
        #[arg(help = "Short description")]
        description: String,
    },

    #[command(about = "List catalog exercises")]
    List {
        #[arg(long, help = "Only the exercise with this exact name")]
        name: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = 0, help = "Page size (0 = no limit)")]
        limit: i64,
    },
}

pub async fn handle(cmd: ExerciseCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = open_database(config).await?;
    let store = PgStore::new(db.clone(), PasswordHasher::new(config.security.bcrypt_cost));
    let result = run(&store, cmd, output_format).await;
    db.close().await;
    result
}

async fn run(store: &PgStore, cmd: ExerciseCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ExerciseCommands::Add { name, description } => {
            let mut exercise = Exercise::new(name, description);
            store.create_exercise(&mut exercise).await?;
            output_success(
                output_format,
                &format!("Exercise '{}' added with id {}", exercise.name, exercise.id),
                Some(json!({ "exercise": exercise })),
            )
        }
        ExerciseCommands::List { name, offset, limit } => {
            let filter = ExerciseFilter { name, offset, limit, ..Default::default() };
            let (exercises, count) = store.find_exercises(filter).await?;
            if exercises.is_empty() {
                return output_empty_collection(output_format, "exercises", "No exercises found");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "count": count, "exercises": exercises }))?);
                }
                OutputFormat::Text => {
                    println!("{:<6} {:<24} DESCRIPTION", "ID", "NAME");
                    for e in &exercises {
                        println!("{:<6} {:<24} {}", e.id, e.name, e.description);
                    }
                    println!("\n{} of {} exercise(s)", exercises.len(), count);
                }
            }
            Ok(())
        }
    }
}
