use clap::Subcommand;
use serde_json::json;

use crate::auth::{JwtMaker, TokenMaker};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Verify a session token with the configured secret and show its claims")]
    Inspect {
        #[arg(help = "Encoded token")]
        token: String,
    },
}

pub fn handle(cmd: TokenCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Inspect { token } => {
            let maker = JwtMaker::new(&config.security.jwt_secret)?;
            let payload = maker.verify_token(token.trim())?;
            let remaining = payload.remaining();

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "Token is valid",
                    Some(json!({ "payload": payload, "remaining_seconds": remaining.num_seconds() })),
                ),
                OutputFormat::Text => {
                    println!("Token is valid");
                    println!("  token id:   {}", payload.token_id);
                    println!("  user:       {} (id {})", payload.username, payload.id);
                    println!("  issued at:  {}", payload.issued_at);
                    println!("  expires at: {}", payload.expires_at);
                    println!("  remaining:  {}m", remaining.num_minutes());
                    Ok(())
                }
            }
        }
    }
}
