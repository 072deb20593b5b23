use anyhow::{Context, Result};
use block_patcher::config::{
    apply_patches, check_patches, load_from_path, read_workspace_version, resolve_target,
    ApplicationError, PatchConfig, PatchResult,
};
use block_patcher::{builtin_config, BlockReplace, COMPLETION_MESSAGE};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "block-patcher")]
#[command(
    about = "Replace a literal text block in a UI source file",
    long_about = "Run without a subcommand to apply the built-in react-json-view italic fix \
                  to JsonFormatter.tsx in the current directory."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patches to a workspace
    Apply {
        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Patch config to apply (defaults to the built-in patch)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Fail any patch whose block is not found
        #[arg(short, long)]
        strict: bool,
    },

    /// Check status of patches without applying
    Status {
        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Patch config to check (defaults to the built-in patch)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List patches and their targets
    List {
        /// Patch config to list (defaults to the built-in patch)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None => cmd_run(),

        Some(Commands::Apply {
            workspace,
            config,
            dry_run,
            diff,
            strict,
        }) => cmd_apply(workspace, config, dry_run, diff, strict),

        Some(Commands::Status { workspace, config }) => cmd_status(workspace, config),

        Some(Commands::List { config }) => cmd_list(config),
    }
}

/// Diagnostics go to stderr so stdout carries only command output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Default action: patch JsonFormatter.tsx in place and report completion.
fn cmd_run() -> Result<()> {
    let outcome = block_patcher::run()
        .with_context(|| format!("failed to patch {}", block_patcher::TARGET_FILE))?;
    tracing::debug!(occurrences = outcome.occurrences(), "built-in patch finished");
    println!("{}", COMPLETION_MESSAGE);
    Ok(())
}

/// Resolve workspace path
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. BLOCK_PATCHER_WORKSPACE environment variable
/// 3. Current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("BLOCK_PATCHER_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: BLOCK_PATCHER_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?.canonicalize()?)
}

fn load_config(path: Option<PathBuf>) -> Result<PatchConfig> {
    match path {
        Some(path) => Ok(load_from_path(&path)?),
        None => Ok(builtin_config()),
    }
}

/// Workspace version, only consulted when the config is version-gated.
fn workspace_version(config: &PatchConfig, workspace: &Path) -> String {
    if config.meta.version_range.is_none() {
        return "0.0.0".to_string();
    }
    read_workspace_version(workspace).unwrap_or_else(|e| {
        eprintln!(
            "{}",
            format!("Warning: {}, using 0.0.0", e).yellow()
        );
        "0.0.0".to_string()
    })
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Replay every patch targeting `file` over `content` in memory.
fn simulate(config: &PatchConfig, workspace: &Path, file: &Path, content: &str) -> String {
    config
        .patches
        .iter()
        .filter(|p| resolve_target(config, p, workspace).canonicalize().ok().as_deref() == Some(file))
        .fold(content.to_string(), |acc, patch| {
            BlockReplace::new(file, patch.old.as_str(), patch.new.as_str())
                .render(&acc)
                .map(|r| r.content)
                .unwrap_or(acc)
        })
}

fn print_failure(patch_id: &str, error: &ApplicationError) {
    eprintln!("{} {}: Error - {}", "✗".red(), patch_id, error);

    match error {
        ApplicationError::NoMatch { file, drift } => {
            eprintln!("  {}", "CONFLICT: Block matched no locations".red());
            eprintln!("  File: {}", file.display());
            if let Some(drift) = drift {
                eprintln!("  Hint: {}", drift);
            }
            eprintln!("  Possible causes:");
            eprintln!("    - Whitespace or comments inside the block changed");
            eprintln!("    - The block was already replaced by hand");
        }
        ApplicationError::Safety(e) => {
            eprintln!("  Refusing to write: {}", e);
        }
        _ => {}
    }
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    config_path: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
    strict: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let mut config = load_config(config_path)?;
    if strict {
        config = config.strict();
    }
    let version = workspace_version(&config, &workspace);

    println!("Workspace: {}", workspace.display());
    if config.meta.version_range.is_some() {
        println!("Version: {}", version);
    }
    if !config.meta.name.is_empty() {
        println!("Patch set: {}", config.meta.name);
    }
    println!();

    // Snapshot targets before writing so diffs survive the rewrite
    let mut before: BTreeMap<PathBuf, String> = BTreeMap::new();
    if show_diff {
        for patch in &config.patches {
            let target = resolve_target(&config, patch, &workspace);
            if let Ok(canonical) = target.canonicalize() {
                if let Ok(content) = fs::read_to_string(&canonical) {
                    before.entry(canonical).or_insert(content);
                }
            }
        }
    }

    let results = if dry_run {
        println!("{}", "  [DRY RUN - showing what would be applied]".cyan());
        check_patches(&config, &workspace, &version)
    } else {
        apply_patches(&config, &workspace, &version)
    };

    let mut total_applied = 0;
    let mut total_unchanged = 0;
    let mut total_skipped = 0;
    let mut total_failed = 0;
    let mut changed_files = Vec::new();

    for (patch_id, result) in results {
        match result {
            Ok(PatchResult::Applied { file, occurrences }) => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                println!(
                    "{} {}: {} to {} ({} occurrence{})",
                    "✓".green(),
                    patch_id,
                    verb,
                    file.display(),
                    occurrences,
                    if occurrences == 1 { "" } else { "s" }
                );
                total_applied += 1;
                if !changed_files.contains(&file) {
                    changed_files.push(file);
                }
            }
            Ok(PatchResult::Unchanged { file }) => {
                println!(
                    "{} {}: Block not found, {} unchanged",
                    "⊙".yellow(),
                    patch_id,
                    file.display()
                );
                total_unchanged += 1;
            }
            Ok(PatchResult::SkippedVersion { reason }) => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), patch_id, reason);
                total_skipped += 1;
            }
            Err(e) => {
                print_failure(&patch_id, &e);
                total_failed += 1;
            }
        }
    }

    if show_diff {
        for file in &changed_files {
            let Some(original) = before.get(file) else {
                continue;
            };
            let modified = if dry_run {
                simulate(&config, &workspace, file, original)
            } else {
                fs::read_to_string(file).unwrap_or_else(|_| original.clone())
            };
            if original != &modified {
                display_diff(file, original, &modified);
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} skipped", format!("{}", total_skipped).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(workspace: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let config = load_config(config_path)?;
    let version = workspace_version(&config, &workspace);

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut pending = Vec::new();
    let mut unchanged = Vec::new();
    let mut skipped = Vec::new();
    let mut failed = Vec::new();

    // Read-only; does not touch workspace files
    for (patch_id, result) in check_patches(&config, &workspace, &version) {
        match result {
            Ok(PatchResult::Applied { occurrences, .. }) => {
                pending.push((patch_id, format!("{} occurrence(s) found", occurrences)));
            }
            Ok(PatchResult::Unchanged { .. }) => unchanged.push(patch_id),
            Ok(PatchResult::SkippedVersion { reason }) => skipped.push((patch_id, reason)),
            Err(e) => failed.push((patch_id, e.to_string())),
        }
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✓".green(),
            "WOULD APPLY".green().bold(),
            pending.len()
        );
        for (id, detail) in &pending {
            println!("  - {} ({})", id, detail.dimmed());
        }
        println!();
    }

    if !unchanged.is_empty() {
        println!(
            "{} {} ({} patches)",
            "⊙".yellow(),
            "BLOCK NOT FOUND".yellow().bold(),
            unchanged.len()
        );
        for id in &unchanged {
            println!("  - {}", id);
        }
        println!();
    }

    if !skipped.is_empty() {
        println!(
            "{} {} ({} patches)",
            "⊘".cyan(),
            "SKIPPED".cyan().bold(),
            skipped.len()
        );
        for (id, reason) in &skipped {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !failed.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✗".red(),
            "FAILED".red().bold(),
            failed.len()
        );
        for (id, reason) in &failed {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_list(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    if !config.meta.name.is_empty() {
        println!("{}", config.meta.name.bold());
    }
    if let Some(description) = &config.meta.description {
        println!("{}", description.dimmed());
    }
    if let Some(range) = &config.meta.version_range {
        println!("Version range: {}", range);
    }
    println!();

    for patch in &config.patches {
        println!(
            "  {} -> {} (on_missing: {}, {} -> {} lines)",
            patch.id,
            patch.file,
            patch.on_missing,
            patch.old.lines().count(),
            patch.new.lines().count()
        );
    }

    Ok(())
}
