use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use titlebar_less::host::{
    candidate_install_dirs, package_json_path, HOST_VERSION_ENV, INSTALL_DIR_ENV,
};
use titlebar_less::rules::titlebar;
use titlebar_less::{
    backup_status, disable, enable, parse_host_version, preview_patches, read_host_version,
    remove_stale_backups, resolve_install_dir, FileStatus, HostError, Report, RuleSet,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "titlebar-less")]
#[command(about = "Enable or disable titlebar-less mode in VS Code", long_about = None)]
#[command(version)]
struct Cli {
    /// VS Code `out/` directory (auto-detected if not specified)
    #[arg(short, long, global = true)]
    install_dir: Option<PathBuf>,

    /// Host version used to name backups (read from package.json if not specified)
    #[arg(long, global = true)]
    host_version: Option<String>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch VS Code (restores any earlier patch first)
    Enable {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore the original files
    Disable {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which targets are patched and which backups exist
    Status,

    /// Show what enable would change without touching any file
    Preview {
        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Delete backups left behind by other VS Code versions
    Sweep,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rules = titlebar::rule_set().context("built-in rule set is invalid")?;
    let install_dir = resolve_install(cli.install_dir, &rules)?;
    let host_version = resolve_host_version(cli.host_version, &install_dir)?;
    warn_if_unsupported(&rules, &host_version);

    match cli.command {
        Commands::Enable { json } => {
            cmd_toggle(&rules, &install_dir, &host_version, json, true)
        }
        Commands::Disable { json } => {
            cmd_toggle(&rules, &install_dir, &host_version, json, false)
        }
        Commands::Status => cmd_status(&rules, &install_dir, &host_version),
        Commands::Preview { diff } => cmd_preview(&rules, &install_dir, diff),
        Commands::Sweep => cmd_sweep(&rules, &install_dir, &host_version),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Resolve the install directory
///
/// Priority order:
/// 1. Explicit --install-dir flag
/// 2. TITLEBAR_LESS_INSTALL_DIR environment variable
/// 3. Well-known install locations
fn resolve_install(cli_dir: Option<PathBuf>, rules: &RuleSet) -> Result<PathBuf> {
    let explicit = cli_dir.or_else(|| env::var_os(INSTALL_DIR_ENV).map(PathBuf::from));

    match resolve_install_dir(explicit.as_deref(), rules, &candidate_install_dirs()) {
        Ok(dir) => Ok(dir),
        Err(HostError::NotFound { searched }) => {
            let searched: Vec<String> = searched
                .iter()
                .map(|dir| format!("    {}", dir.display()))
                .collect();
            anyhow::bail!(
                "{}\n  Searched:\n{}\n{}\n  {}\n  {}",
                "Could not find a VS Code install.".red(),
                searched.join("\n"),
                "Try one of:".bold(),
                "1. Specify explicitly: titlebar-less --install-dir /path/to/resources/app/out enable",
                format!("2. Set environment variable: export {INSTALL_DIR_ENV}=/path/to/resources/app/out"),
            )
        }
        Err(e) => Err(e.into()),
    }
}

fn resolve_host_version(cli_version: Option<String>, install_dir: &Path) -> Result<String> {
    if let Some(version) = cli_version {
        return parse_host_version(&version).context("invalid --host-version");
    }
    match env::var(HOST_VERSION_ENV) {
        Ok(version) if !version.trim().is_empty() => {
            return parse_host_version(&version)
                .with_context(|| format!("invalid {HOST_VERSION_ENV}"));
        }
        Ok(_) => tracing::debug!("{} is empty, reading package.json", HOST_VERSION_ENV),
        Err(_) => {}
    }

    read_host_version(install_dir).with_context(|| {
        format!(
            "could not determine the VS Code version from {}; pass --host-version or set {}",
            package_json_path(install_dir).display(),
            HOST_VERSION_ENV
        )
    })
}

fn warn_if_unsupported(rules: &RuleSet, host_version: &str) {
    match rules.supports(host_version) {
        Ok(true) => {}
        Ok(false) => eprintln!(
            "{}",
            format!(
                "Warning: rules were written for VS Code {}, found {}; patching may not match",
                rules.version_range.as_deref().unwrap_or("any"),
                host_version
            )
            .yellow()
        ),
        Err(e) => eprintln!("{}", format!("Warning: {e}").yellow()),
    }
}

fn cmd_toggle(
    rules: &RuleSet,
    install_dir: &Path,
    host_version: &str,
    json: bool,
    enabling: bool,
) -> Result<()> {
    // Backups from other versions must never be restored; drop them first.
    let sweep = remove_stale_backups(rules, install_dir, host_version);
    if !sweep.is_clean() {
        eprintln!(
            "{}",
            format!("Warning: {} stale backups could not be removed", sweep.failed.len()).yellow()
        );
    }

    let report = if enabling {
        enable(rules, install_dir, host_version)
    } else {
        disable(rules, install_dir, host_version)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(install_dir, host_version, &report);
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_report(install_dir: &Path, host_version: &str, report: &Report) {
    println!("Install: {}", install_dir.display());
    println!("Version: {}", host_version);
    println!();

    for file in &report.result.files {
        let marker = match file.status {
            FileStatus::Applied | FileStatus::Restored => "✓".green(),
            FileStatus::NoBackup => "⊙".yellow(),
            FileStatus::BackupExists => "⊘".cyan(),
            FileStatus::PartialMatch { .. } | FileStatus::Failed { .. } => "✗".red(),
        };
        println!("{} {}", marker, file);
    }

    println!();
    if report.is_success() {
        println!("{}", report.to_string().green());
    } else {
        eprintln!("{}", report.to_string().red());
    }
}

fn cmd_status(rules: &RuleSet, install_dir: &Path, host_version: &str) -> Result<()> {
    println!("{}", "Patch Status Report".bold());
    println!("Install: {}", install_dir.display());
    println!("Version: {}", host_version);
    println!();

    let states = backup_status(rules, install_dir, host_version);
    for state in &states {
        if !state.target_exists {
            println!("{} {} ({})", "✗".red(), state.target, "missing".red());
        } else if state.is_patched() {
            println!("{} {} ({})", "✓".green(), state.target, "patched".green());
        } else {
            println!("{} {} ({})", "⊙".yellow(), state.target, "original".yellow());
        }
        for stale in &state.stale {
            println!("    stale backup: {}", stale.display().to_string().dimmed());
        }
    }

    let patched = states.iter().filter(|s| s.is_patched()).count();
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} of {} files patched", patched, states.len());

    Ok(())
}

fn cmd_preview(rules: &RuleSet, install_dir: &Path, show_diff: bool) -> Result<()> {
    println!("{}", "[DRY RUN - showing what enable would change]".cyan());
    println!();

    let mut applicable = 0;
    let mut total = 0;

    for preview in preview_patches(rules, install_dir) {
        match preview {
            Ok(preview) => {
                total += preview.rules;
                if preview.is_full_match() {
                    applicable += preview.rules;
                    println!(
                        "{} {}: all {} rules match",
                        "✓".green(),
                        preview.target,
                        preview.rules
                    );
                    if show_diff {
                        display_diff(&preview.path, &preview.original, &preview.patched);
                    }
                } else {
                    println!(
                        "{} {}: {}/{} rules match, file would be left untouched",
                        "✗".red(),
                        preview.target,
                        preview.found,
                        preview.rules
                    );
                }
            }
            Err(e) => eprintln!("{} {}", "✗".red(), e),
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {}/{} patches applicable", applicable, total);

    Ok(())
}

fn cmd_sweep(rules: &RuleSet, install_dir: &Path, host_version: &str) -> Result<()> {
    let report = remove_stale_backups(rules, install_dir, host_version);

    for path in &report.removed {
        println!("{} removed {}", "✓".green(), path.display());
    }
    for (path, reason) in &report.failed {
        eprintln!("{} {}: {}", "✗".red(), path.display(), reason);
    }
    if report.removed.is_empty() && report.failed.is_empty() {
        println!("No stale backups.");
    }

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}

/// Helper: Show unified diff between original and patched content
fn display_diff(file: &Path, original: &str, patched: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, patched);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
    }
    println!();
}
