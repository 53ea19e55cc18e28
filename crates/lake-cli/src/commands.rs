use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::debug;

use lake_sdk::{HandlerRegistry, Repository, RepositoryConfig, TripleSet, WriteOutcome};
use lake_types::ntriples::{parse_ntriples, to_ntriples};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    if let Command::Init(args) = &cli.command {
        return cmd_init(&cli.config, args);
    }
    let migrating = matches!(cli.command, Command::Migrate(_));
    let repo = open(&cli.config, migrating)?;
    let actor = cli.actor.as_str();

    match cli.command {
        Command::Init(_) => Ok(()),
        Command::Create(args) => {
            let triples = read_triples(args.file.as_deref())?;
            report("Created", &repo.create(&args.uid, triples, actor)?);
            Ok(())
        }
        Command::Update(args) => {
            let triples = read_triples(args.file.as_deref())?;
            report("Updated", &repo.update(&args.uid, triples, actor)?);
            Ok(())
        }
        Command::Put(args) => {
            let triples = read_triples(args.file.as_deref())?;
            report("Stored", &repo.put(&args.uid, triples, actor)?);
            Ok(())
        }
        Command::Get(args) => cmd_get(&repo, args),
        Command::Children(args) => {
            for child in repo.children(&args.uid)? {
                println!("{child}");
            }
            Ok(())
        }
        Command::Delete(args) => {
            if args.purge {
                report("Purged", &repo.purge(&args.uid, actor)?);
            } else {
                report("Deleted", &repo.delete(&args.uid, actor)?);
            }
            Ok(())
        }
        Command::Resurrect(args) => {
            report("Resurrected", &repo.resurrect(&args.uid, actor)?);
            Ok(())
        }
        Command::Versions(args) => cmd_versions(&repo, &args.uid),
        Command::Revert(args) => {
            report("Reverted", &repo.revert(&args.uid, &args.version, actor)?);
            Ok(())
        }
        Command::Binary(args) => cmd_binary(&repo, args.action, actor),
        Command::Fsck => cmd_fsck(&repo),
        Command::Migrate(args) => cmd_migrate(&repo, args),
    }
}

fn open(config_path: &Path, migrating: bool) -> anyhow::Result<Repository> {
    if !config_path.exists() {
        bail!(
            "no configuration at {}; run `lake init` first",
            config_path.display()
        );
    }
    let config = RepositoryConfig::load(config_path)?;
    let registry = HandlerRegistry::with_builtins();
    let repo = if migrating {
        Repository::open_for_migration(config, &registry)?
    } else {
        Repository::open(config, &registry).map_err(|e| {
            if e.is_migration_required() {
                anyhow::anyhow!("{e}\nhint: run `lake migrate`")
            } else {
                e.into()
            }
        })?
    };
    debug!(config = %config_path.display(), "opened repository");
    Ok(repo)
}

fn read_triples(file: Option<&Path>) -> anyhow::Result<TripleSet> {
    let Some(path) = file else {
        return Ok(TripleSet::new());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_ntriples(&text).with_context(|| format!("parsing {}", path.display()))?)
}

fn report(verb: &str, outcome: &WriteOutcome) {
    println!("{} {} {}", "✓".green().bold(), verb, outcome.uid.to_string().bold());
    if let Some(version) = &outcome.version {
        println!("  Version: {} ({})", version.label.yellow(), version.id.dimmed());
    }
    for triple in &outcome.dropped {
        println!("  {} {}", "dropped:".yellow(), triple);
    }
}

fn cmd_init(config_path: &Path, args: &InitArgs) -> anyhow::Result<()> {
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }
    let config = RepositoryConfig::default();
    fs::write(config_path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", config_path.display()))?;
    let repo = Repository::open(config, &HandlerRegistry::with_builtins())?;
    println!(
        "{} Initialized Lake repository ({})",
        "✓".green().bold(),
        config_path.display().to_string().bold()
    );
    println!(
        "  Referential integrity: {}",
        repo.layout().policy().to_string().cyan()
    );
    println!("  Digest: {}", repo.config().uuid.algo.to_string().cyan());
    Ok(())
}

fn cmd_get(repo: &Repository, args: GetArgs) -> anyhow::Result<()> {
    let text = match &args.version {
        Some(version) => to_ntriples(&repo.get_version(&args.uid, version)?),
        None => {
            let snapshot = repo.get(&args.uid)?;
            let mut triples = snapshot.state;
            if args.metadata {
                triples.extend(snapshot.metadata);
            }
            if args.membership {
                triples.extend(repo.membership(&args.uid)?);
            }
            to_ntriples(&triples)
        }
    };
    print!("{text}");
    Ok(())
}

fn cmd_versions(repo: &Repository, uid: &str) -> anyhow::Result<()> {
    let versions = repo.versions(uid)?;
    if versions.is_empty() {
        println!("No versions.");
    }
    for version in versions {
        let created = version
            .created
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>5}  {}  {}",
            version.label.yellow().bold(),
            version.id.dimmed(),
            created
        );
    }
    Ok(())
}

fn cmd_binary(repo: &Repository, action: BinaryAction, actor: &str) -> anyhow::Result<()> {
    match action {
        BinaryAction::Put { uid, file, mime } => {
            let data = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let outcome = repo.put_binary(&uid, &data, &mime, actor)?;
            report("Stored", &outcome);
            println!("  Size: {} bytes", data.len());
        }
        BinaryAction::Get { uid, output } => {
            let content = repo.get_binary(&uid)?;
            match output {
                Some(path) => {
                    fs::write(&path, &content.data)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!(
                        "{} Wrote {} bytes to {}",
                        "✓".green().bold(),
                        content.data.len(),
                        path.display()
                    );
                }
                None => std::io::stdout().write_all(&content.data)?,
            }
        }
    }
    Ok(())
}

fn cmd_fsck(repo: &Repository) -> anyhow::Result<()> {
    let report = repo.fsck()?;
    if report.is_clean() {
        println!(
            "{} {} payloads verified, no issues.",
            "✓".green().bold(),
            report.checked
        );
        return Ok(());
    }
    for digest in &report.corrupt {
        println!("  {} {}", "corrupt:".red().bold(), digest);
    }
    bail!(
        "{} of {} payloads failed fixity",
        report.corrupt.len(),
        report.checked
    )
}

fn cmd_migrate(repo: &Repository, args: MigrateArgs) -> anyhow::Result<()> {
    let report = repo.migrate_policy(args.to)?;
    let from = report
        .from
        .map(|p| p.to_string())
        .unwrap_or_else(|| "unrecorded".into());
    println!(
        "{} Referential integrity {} -> {}",
        "✓".green().bold(),
        from.yellow(),
        report.to.to_string().green()
    );
    println!("  Scanned: {} resources", report.scanned);
    for (uid, triple) in &report.pruned {
        println!("  {} {}: {}", "pruned:".yellow(), uid, triple);
    }
    if args.to.is_some_and(|to| to != repo.config().store.ldp_rs.referential_integrity) {
        println!(
            "  {} update referential_integrity in the configuration to {}",
            "note:".cyan(),
            report.to
        );
    }
    Ok(())
}
