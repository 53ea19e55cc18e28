use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use lake_sdk::{IntegrityPolicy, DEFAULT_ACTOR};

#[derive(Parser)]
#[command(name = "lake", about = "Lake linked data repository", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository configuration file.
    #[arg(short, long, global = true, default_value = "lake.toml")]
    pub config: PathBuf,

    /// Actor recorded as the author of writes.
    #[arg(long, global = true, default_value = DEFAULT_ACTOR)]
    pub actor: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a default configuration and create the root resource
    Init(InitArgs),
    /// Create a new RDF resource
    Create(WriteArgs),
    /// Replace the state of an existing resource, freezing a version
    Update(WriteArgs),
    /// Create or replace a resource
    Put(WriteArgs),
    /// Print the state of a resource as N-Triples
    Get(GetArgs),
    /// List the children of a container
    Children(UidArgs),
    /// Delete a resource, leaving a tombstone
    Delete(DeleteArgs),
    /// Bring a tombstoned resource back
    Resurrect(UidArgs),
    /// List the versions of a resource
    Versions(UidArgs),
    /// Make an earlier version current again
    Revert(RevertArgs),
    /// Store or read binary resources
    Binary(BinaryArgs),
    /// Verify every stored payload against its digest
    Fsck,
    /// Re-validate the store under a referential integrity policy
    Migrate(MigrateArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct UidArgs {
    pub uid: String,
}

#[derive(Args)]
pub struct WriteArgs {
    pub uid: String,
    /// N-Triples file with the resource state. Empty state when omitted.
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub uid: String,
    /// Include server-managed metadata.
    #[arg(short, long)]
    pub metadata: bool,
    /// Include membership triples of a direct or indirect container.
    #[arg(long)]
    pub membership: bool,
    /// Print a frozen version instead of the current state.
    #[arg(long)]
    pub version: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub uid: String,
    /// Remove the resource and its history for good.
    #[arg(long)]
    pub purge: bool,
}

#[derive(Args)]
pub struct RevertArgs {
    pub uid: String,
    /// Version id or label.
    pub version: String,
}

#[derive(Args)]
pub struct BinaryArgs {
    #[command(subcommand)]
    pub action: BinaryAction,
}

#[derive(Subcommand)]
pub enum BinaryAction {
    /// Store a file as the payload of a binary resource
    Put {
        uid: String,
        file: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },
    /// Write the payload of a binary resource to a file or stdout
    Get {
        uid: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Target policy. Defaults to the configured one.
    #[arg(long)]
    pub to: Option<IntegrityPolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["lake", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(_)));
        assert_eq!(cli.config, PathBuf::from("lake.toml"));
        assert_eq!(cli.actor, DEFAULT_ACTOR);
    }

    #[test]
    fn parse_global_options() {
        let cli =
            Cli::try_parse_from(["lake", "get", "a/b", "-c", "/etc/lake.toml", "--actor", "bob"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/lake.toml"));
        assert_eq!(cli.actor, "bob");
        if let Command::Get(args) = cli.command {
            assert_eq!(args.uid, "a/b");
            assert!(!args.metadata);
            assert!(!args.membership);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_get_membership() {
        let cli = Cli::try_parse_from(["lake", "get", "pages", "--membership", "-m"]).unwrap();
        let Command::Get(args) = cli.command else {
            panic!("wrong command");
        };
        assert!(args.membership);
        assert!(args.metadata);
    }

    #[test]
    fn parse_create_with_file() {
        let cli = Cli::try_parse_from(["lake", "create", "books", "-f", "books.nt"]).unwrap();
        if let Command::Create(args) = cli.command {
            assert_eq!(args.file, Some(PathBuf::from("books.nt")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_delete_purge() {
        let cli = Cli::try_parse_from(["lake", "delete", "old", "--purge"]).unwrap();
        if let Command::Delete(args) = cli.command {
            assert!(args.purge);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_binary_put() {
        let cli = Cli::try_parse_from([
            "lake", "binary", "put", "cover", "cover.png", "--mime", "image/png",
        ])
        .unwrap();
        let Command::Binary(args) = cli.command else {
            panic!("wrong command");
        };
        match args.action {
            BinaryAction::Put { uid, mime, .. } => {
                assert_eq!(uid, "cover");
                assert_eq!(mime, "image/png");
            }
            BinaryAction::Get { .. } => panic!("wrong action"),
        }
    }

    #[test]
    fn parse_migrate_policy() {
        let cli = Cli::try_parse_from(["lake", "migrate", "--to", "strict"]).unwrap();
        if let Command::Migrate(args) = cli.command {
            assert_eq!(args.to, Some(IntegrityPolicy::Strict));
        } else {
            panic!("wrong command");
        }
        assert!(Cli::try_parse_from(["lake", "migrate", "--to", "sometimes"]).is_err());
    }
}
