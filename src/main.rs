// src/main.rs

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use repomirror::config::{
    BOOTSTRAP_PACKAGE, DEFAULT_CPU, DEFAULT_ENDPOINT, DEFAULT_LOCAL_ROOT, DEFAULT_RELEASE, DEFAULT_SEED_FILE,
    MirrorConfig, official_repo_url,
};
use repomirror::db::{DEFAULT_CACHE_DIR, DEFAULT_DB_PATH};
use repomirror::mirror::{DEFAULT_WORKERS, VerifyMode};
use repomirror::packager::{ArtifactPackager, CatalogArchiver};
use repomirror::packages::load_seed_list;
use repomirror::pipeline::{self, MirrorSummary};
use repomirror::repository::loader::{DEFAULT_CATALOG_ARCHIVE, DEFAULT_CATALOG_MEMBER};
use repomirror::repository::{HTTP_TIMEOUT, IndexLoader, IndexSource, MAX_RETRIES, RepositoryClient};
use repomirror::resolver::{self, UnknownPolicy};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "repomirror")]
#[command(author, version, about = "Mirror a dependency-closed subset of a pkg repository", long_about = None)]
struct Cli {
    /// Disable colored log output
    #[arg(short, long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the selected packages and their dependencies
    Mirror {
        #[command(flatten)]
        source: SourceArgs,
        /// Local mirror directory
        #[arg(short, long, default_value = DEFAULT_LOCAL_ROOT)]
        repo: PathBuf,
        /// Concurrent download workers
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
        /// Hash existing artifacts instead of trusting a matching size
        #[arg(long)]
        verify_checksum: bool,
        /// Connect timeout in seconds; artifact downloads also get a size-scaled deadline
        #[arg(long, default_value_t = HTTP_TIMEOUT.as_secs())]
        timeout: u64,
        /// Attempts per download
        #[arg(long, default_value_t = MAX_RETRIES)]
        retries: u32,
        /// Do not add the pkg bootstrap package to the selection
        #[arg(long)]
        no_bootstrap: bool,
        /// Exit with an error if any package is unknown, pruned, or failed
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Print the dependency closure of the selection without downloading
    Resolve {
        #[command(flatten)]
        source: SourceArgs,
        /// Do not add the pkg bootstrap package to the selection
        #[arg(long)]
        no_bootstrap: bool,
    },
    /// Build a repository from the local package database and cache
    FromCache {
        /// Package database path
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
        /// Package cache directory
        #[arg(long, default_value = DEFAULT_CACHE_DIR)]
        cache: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "mirror")]
        output: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

/// Where the catalog comes from and what to select from it
#[derive(Args)]
struct SourceArgs {
    /// Repository root URL (overrides release, cpu, and endpoint)
    #[arg(short, long)]
    url: Option<String>,
    /// FreeBSD release
    #[arg(short = 'v', long, default_value = DEFAULT_RELEASE)]
    release: String,
    /// CPU architecture
    #[arg(short, long, default_value = DEFAULT_CPU)]
    cpu: String,
    /// Repository branch (quarterly or latest)
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// File listing the wanted packages, one per line
    #[arg(short = 'l', long = "list", default_value = DEFAULT_SEED_FILE)]
    seed_file: PathBuf,
    /// Catalog archive name under the repository root
    #[arg(long, default_value = DEFAULT_CATALOG_ARCHIVE)]
    catalog_archive: String,
    /// Drop unknown packages but keep packages that depend on them
    #[arg(short, long, conflicts_with = "prune")]
    skip_unknown: bool,
    /// Drop unknown packages and everything that depends on them
    #[arg(long)]
    prune: bool,
}

impl SourceArgs {
    fn repo_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => official_repo_url(&self.release, &self.cpu, &self.endpoint),
        }
    }

    fn policy(&self) -> UnknownPolicy {
        if self.prune {
            UnknownPolicy::Prune
        } else if self.skip_unknown {
            UnknownPolicy::Skip
        } else {
            UnknownPolicy::FailFast
        }
    }
}

fn bootstrap(no_bootstrap: bool) -> Option<String> {
    (!no_bootstrap).then(|| BOOTSTRAP_PACKAGE.to_string())
}

fn print_summary(summary: &MirrorSummary) {
    let report = &summary.report;
    println!("Mirrored {} package(s) in {}s", report.entries.len(), summary.duration().num_seconds());
    println!("  Fetched: {}", report.fetched.len());
    println!("  Cached: {}", report.cached.len());

    if !summary.resolution.unknown.is_empty() {
        println!("  Unknown:");
        for name in &summary.resolution.unknown {
            println!("    - {}", name);
        }
    }
    if !summary.resolution.pruned.is_empty() {
        println!("  Pruned:");
        for name in &summary.resolution.pruned {
            println!("    - {}", name);
        }
    }
    if !report.failed.is_empty() {
        println!("  Failed:");
        for failure in &report.failed {
            println!("    - {}: {}", failure.name, failure.reason);
        }
    }
    println!("Manifest: {}", summary.manifest_path.display());
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(!cli.no_color)
        .init();

    match cli.command {
        Commands::Mirror {
            source,
            repo,
            workers,
            verify_checksum,
            timeout,
            retries,
            no_bootstrap,
            fail_on_error,
        } => {
            let config = MirrorConfig {
                repo_url: source.repo_url(),
                local_root: repo,
                seed_file: source.seed_file.clone(),
                catalog_archive: source.catalog_archive.clone(),
                catalog_member: DEFAULT_CATALOG_MEMBER.to_string(),
                unknown_policy: source.policy(),
                verify_mode: if verify_checksum { VerifyMode::Checksum } else { VerifyMode::Size },
                workers,
                bootstrap_package: bootstrap(no_bootstrap),
                timeout: Duration::from_secs(timeout),
                max_retries: retries,
            };
            info!("Mirroring {} into {}", config.repo_url, config.local_root.display());

            let client = RepositoryClient::with_settings(config.timeout, config.max_retries)?;
            let archiver = CatalogArchiver::new();
            let packagers: [&dyn ArtifactPackager; 1] = [&archiver];
            let summary = pipeline::mirror_repository(&config, &client, &packagers)?;

            print_summary(&summary);

            if fail_on_error && !summary.is_clean() {
                return Err(anyhow::anyhow!(
                    "{} package(s) could not be mirrored",
                    summary.problem_count()
                ));
            }
            Ok(())
        }
        Commands::Resolve { source, no_bootstrap } => {
            let mut wanted = load_seed_list(&source.seed_file)?;
            if let Some(name) = bootstrap(no_bootstrap) {
                wanted.insert(name);
            }

            let client = RepositoryClient::new()?;
            let index = IndexLoader::new(&client)
                .with_archive_name(&source.catalog_archive)
                .load(&IndexSource::Remote(source.repo_url()))?;
            let resolution = resolver::resolve(&wanted, &index, source.policy())?;

            for name in &resolution.resolved {
                println!("{}", name);
            }
            for name in &resolution.unknown {
                println!("# unknown: {}", name);
            }
            for name in &resolution.pruned {
                println!("# pruned: {}", name);
            }
            println!(
                "\nTotal: {} package(s) from {} selected",
                resolution.resolved.len(),
                wanted.len()
            );
            Ok(())
        }
        Commands::FromCache { db, cache, output } => {
            info!("Exporting cached packages from {} into {}", db.display(), output.display());
            let summary = pipeline::export_from_cache(&db, &cache, &output)?;

            println!("Exported {} package(s) into {}", summary.entries.len(), output.display());
            println!("Manifest: {}", summary.manifest_path.display());
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "repomirror", &mut io::stdout());
            Ok(())
        }
    }
}
