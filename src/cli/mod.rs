pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "campusctl")]
#[command(about = "Campus CLI - operator interface for tenant lifecycle management")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Tenant lifecycle management")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::commands::tenant::TenantCommands;
    use super::*;

    #[test]
    fn parses_activation_subcommands() {
        let cli = Cli::try_parse_from(["campusctl", "tenant", "deactivate", "acme"])
            .expect("deactivate parses");
        match cli.command {
            Commands::Tenant {
                cmd: TenantCommands::Deactivate { slug },
            } => assert_eq!(slug, "acme"),
            _ => panic!("expected tenant deactivate"),
        }

        let cli = Cli::try_parse_from(["campusctl", "tenant", "activate", "acme"])
            .expect("activate parses");
        assert!(matches!(
            cli.command,
            Commands::Tenant {
                cmd: TenantCommands::Activate { .. }
            }
        ));
    }
}
