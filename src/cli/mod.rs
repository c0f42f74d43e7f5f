pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};

use crate::services::sync_service::SyncEntity;

#[derive(Parser)]
#[command(name = "weclapp-manager")]
#[command(about = "WeClapp Manager - ERP sync, webhooks and role-scoped REST API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Print command results as JSON")]
    pub json: bool,

    /// Defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Pull entities from WeClapp into the local database")]
    Sync {
        #[arg(value_enum, default_value_t = SyncTarget::All)]
        entity: SyncTarget,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncTarget {
    Users,
    Tasks,
    Orders,
    Parties,
    TimeEntries,
    All,
}

impl SyncTarget {
    /// Entities to pull, in dependency order
    pub fn entities(&self) -> Vec<SyncEntity> {
        match self {
            SyncTarget::Users => vec![SyncEntity::Users],
            SyncTarget::Tasks => vec![SyncEntity::Tasks],
            SyncTarget::Orders => vec![SyncEntity::Orders],
            SyncTarget::Parties => vec![SyncEntity::Parties],
            SyncTarget::TimeEntries => vec![SyncEntity::TimeEntries],
            SyncTarget::All => SyncEntity::ALL.to_vec(),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(port).await,
        Commands::Sync { entity } => commands::sync::handle(entity, cli.json).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["weclapp-manager"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn sync_accepts_kebab_case_entities() {
        let cli = Cli::try_parse_from(["weclapp-manager", "sync", "time-entries", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Some(Commands::Sync { entity }) => {
                assert_eq!(entity, SyncTarget::TimeEntries);
                assert_eq!(entity.entities(), vec![SyncEntity::TimeEntries]);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn sync_defaults_to_everything() {
        let cli = Cli::try_parse_from(["weclapp-manager", "sync"]).unwrap();
        match cli.command {
            Some(Commands::Sync { entity }) => {
                assert_eq!(entity, SyncTarget::All);
                assert_eq!(entity.entities().first(), Some(&SyncEntity::Users));
                assert_eq!(entity.entities().len(), 5);
            }
            _ => panic!("expected sync"),
        }
        assert!(Cli::try_parse_from(["weclapp-manager", "sync", "invoices"]).is_err());
    }
}
