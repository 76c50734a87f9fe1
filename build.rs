// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn source_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("url")
            .short('u')
            .long("url")
            .value_name("URL")
            .help("Repository root URL (overrides release, cpu, and endpoint)"),
    )
    .arg(
        Arg::new("release")
            .short('v')
            .long("release")
            .default_value("14")
            .help("FreeBSD release"),
    )
    .arg(
        Arg::new("cpu")
            .short('c')
            .long("cpu")
            .default_value("amd64")
            .help("CPU architecture"),
    )
    .arg(
        Arg::new("endpoint")
            .short('e')
            .long("endpoint")
            .default_value("quarterly")
            .help("Repository branch (quarterly or latest)"),
    )
    .arg(
        Arg::new("list")
            .short('l')
            .long("list")
            .value_name("FILE")
            .default_value("selected.txt")
            .help("File listing the wanted packages, one per line"),
    )
    .arg(
        Arg::new("catalog_archive")
            .long("catalog-archive")
            .default_value("packagesite.txz")
            .help("Catalog archive name under the repository root"),
    )
    .arg(
        Arg::new("skip_unknown")
            .short('s')
            .long("skip-unknown")
            .action(ArgAction::SetTrue)
            .help("Drop unknown packages but keep packages that depend on them"),
    )
    .arg(
        Arg::new("prune")
            .long("prune")
            .action(ArgAction::SetTrue)
            .help("Drop unknown packages and everything that depends on them"),
    )
    .arg(
        Arg::new("no_bootstrap")
            .long("no-bootstrap")
            .action(ArgAction::SetTrue)
            .help("Do not add the pkg bootstrap package to the selection"),
    )
}

fn build_cli() -> Command {
    Command::new("repomirror")
        .version(env!("CARGO_PKG_VERSION"))
        .author("repomirror Contributors")
        .about("Mirror a dependency-closed subset of a pkg repository")
        .subcommand_required(true)
        .arg(
            Arg::new("no_color")
                .short('n')
                .long("no-color")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Disable colored log output"),
        )
        .subcommand(
            source_args(Command::new("mirror").about("Mirror the selected packages and their dependencies"))
                .arg(
                    Arg::new("repo")
                        .short('r')
                        .long("repo")
                        .value_name("DIR")
                        .default_value("repo")
                        .help("Local mirror directory"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .default_value("4")
                        .help("Concurrent download workers"),
                )
                .arg(
                    Arg::new("verify_checksum")
                        .long("verify-checksum")
                        .action(ArgAction::SetTrue)
                        .help("Hash existing artifacts instead of trusting a matching size"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .default_value("30")
                        .help("Connect timeout in seconds; artifact downloads also get a size-scaled deadline"),
                )
                .arg(
                    Arg::new("retries")
                        .long("retries")
                        .default_value("3")
                        .help("Attempts per download"),
                )
                .arg(
                    Arg::new("fail_on_error")
                        .long("fail-on-error")
                        .action(ArgAction::SetTrue)
                        .help("Exit with an error if any package is unknown, pruned, or failed"),
                ),
        )
        .subcommand(source_args(
            Command::new("resolve").about("Print the dependency closure of the selection without downloading"),
        ))
        .subcommand(
            Command::new("from-cache")
                .about("Build a repository from the local package database and cache")
                .arg(
                    Arg::new("db")
                        .long("db")
                        .default_value("/var/db/pkg/local.sqlite")
                        .help("Package database path"),
                )
                .arg(
                    Arg::new("cache")
                        .long("cache")
                        .default_value("/var/cache/pkg")
                        .help("Package cache directory"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .default_value("mirror")
                        .help("Output directory"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("repomirror.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
