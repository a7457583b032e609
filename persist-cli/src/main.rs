/*!
Persist CLI - Command-line interface for persisted state files.

This CLI provides utilities for inspecting, converting and managing the files
written by the persist engine with any of the bundled codecs.
*/

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use persist_core::{naming, CodecKind, FileEngine, PropertyValue, Snapshot, TracingLogger};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "persist")]
#[command(about = "CLI for persisted object state files")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Codec to use (guessed from the file extension when omitted)
    #[arg(short, long, global = true, value_enum)]
    codec: Option<CodecArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CodecArg {
    Json,
    Toml,
    Bincode,
    GzipBincode,
}

impl From<CodecArg> for CodecKind {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Json => CodecKind::Json,
            CodecArg::Toml => CodecKind::Toml,
            CodecArg::Bincode => CodecKind::Bincode,
            CodecArg::GzipBincode => CodecKind::GzipBincode,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the properties stored in a state file
    Show {
        /// State file path
        file: PathBuf,
    },
    /// List the state files in a directory
    List {
        /// Directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Re-encode a state file with another codec
    Convert {
        /// Source state file
        input: PathBuf,
        /// Destination state file
        output: PathBuf,
        /// Codec for the destination (guessed from its extension when omitted)
        #[arg(long, value_enum)]
        to: Option<CodecArg>,
    },
    /// Print the default file name for a type
    Name {
        /// Type name, optionally path-qualified or generic
        type_name: String,
    },
    /// Delete a state file
    Delete {
        /// State file path
        file: PathBuf,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Tabled)]
struct PropertyInfo {
    #[tabled(rename = "Property")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct StateFileInfo {
    #[tabled(rename = "File")]
    name: String,
    #[tabled(rename = "Codec")]
    codec: String,
    #[tabled(rename = "Properties")]
    properties: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let codec = cli.codec.map(CodecKind::from);

    // Execute command
    match cli.command {
        Commands::Show { file } => show_state(codec, &file)?,
        Commands::List { dir } => list_states(codec, &dir)?,
        Commands::Convert { input, output, to } => {
            convert_state(codec, to.map(CodecKind::from), &input, &output)?
        }
        Commands::Name { type_name } => print_name(codec, &type_name),
        Commands::Delete { file, force } => delete_state(codec, &file, force)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Pick the codec for `path`: the explicit choice wins over the extension.
fn resolve_codec(explicit: Option<CodecKind>, path: &Path) -> Result<CodecKind, anyhow::Error> {
    explicit.or_else(|| CodecKind::from_path(path)).ok_or_else(|| {
        anyhow!(
            "cannot guess the codec of {}; pass --codec",
            path.display()
        )
    })
}

fn engine_for(kind: CodecKind) -> FileEngine {
    FileEngine::with_logger(kind.build(), Arc::new(TracingLogger))
}

fn load_record(kind: CodecKind, file: &Path) -> Result<Snapshot, anyhow::Error> {
    engine_for(kind)
        .load_snapshot(file)?
        .ok_or_else(|| anyhow!("could not load {} as {}", file.display(), kind.name()))
}

fn show_state(codec: Option<CodecKind>, file: &Path) -> Result<(), anyhow::Error> {
    let kind = resolve_codec(codec, file)?;
    info!("Showing {} ({})", file.display(), kind.name());

    let record = load_record(kind, file)?;
    println!("{} ({}, {} properties)", file.display(), kind.name(), record.len());

    if record.is_empty() {
        return Ok(());
    }

    let rows: Vec<PropertyInfo> = record
        .iter()
        .map(|(name, value)| PropertyInfo {
            name: name.to_string(),
            kind: value.kind().to_string(),
            value: format_value(value),
        })
        .collect();
    println!("{}", Table::new(rows));

    Ok(())
}

fn list_states(codec: Option<CodecKind>, dir: &Path) -> Result<(), anyhow::Error> {
    if !dir.is_dir() {
        println!("No directory found at: {}", dir.display());
        return Ok(());
    }

    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let Some(kind) = codec.or_else(|| CodecKind::from_path(&path)) else {
            continue;
        };

        let properties = match engine_for(kind).load_snapshot(&path) {
            Ok(Some(record)) => record.len().to_string(),
            Ok(None) | Err(_) => {
                warn!("Failed to read {} as {}", path.display(), kind.name());
                "unreadable".to_string()
            }
        };

        let (size, modified) = match std::fs::metadata(&path) {
            Ok(meta) => (
                format_size(meta.len()),
                meta.modified()
                    .map(format_time)
                    .unwrap_or_else(|_| "Unknown".to_string()),
            ),
            Err(_) => ("Unknown".to_string(), "Unknown".to_string()),
        };

        files.push(StateFileInfo {
            name: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            codec: kind.name().to_string(),
            properties,
            size,
            modified,
        });
    }

    if files.is_empty() {
        println!("No state files found");
    } else {
        files.sort_by(|a, b| a.name.cmp(&b.name));
        println!("{}", Table::new(files));
    }

    Ok(())
}

fn convert_state(
    from: Option<CodecKind>,
    to: Option<CodecKind>,
    input: &Path,
    output: &Path,
) -> Result<(), anyhow::Error> {
    let source = resolve_codec(from, input)?;
    let target = to
        .or_else(|| CodecKind::from_path(output))
        .ok_or_else(|| anyhow!("cannot guess the codec of {}; pass --to", output.display()))?;
    info!("Converting {} ({}) to {} ({})", input.display(), source.name(), output.display(), target.name());

    let record = load_record(source, input)?;
    if !engine_for(target).save_snapshot(output, &record)? {
        error!("✗ Failed to write {}", output.display());
        bail!("could not write {} as {}", output.display(), target.name());
    }

    println!(
        "✓ Converted {} properties from {} to {}",
        record.len(),
        source.name(),
        target.name()
    );
    Ok(())
}

fn print_name(codec: Option<CodecKind>, type_name: &str) {
    let kind = codec.unwrap_or(CodecKind::Json);
    let type_name = naming::strip_type_name(type_name);
    println!("{}", naming::default_file_name(type_name, &kind.build()));
}

fn delete_state(codec: Option<CodecKind>, file: &Path, force: bool) -> Result<(), anyhow::Error> {
    if !force {
        print!("Are you sure you want to delete '{}'? (y/N): ", file.display());
        use std::io::{self, Write};
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().to_lowercase().starts_with('y') {
            println!("Deletion cancelled");
            return Ok(());
        }
    }

    // Deletion does not decode, so any codec will do when none can be guessed.
    let kind = codec
        .or_else(|| CodecKind::from_path(file))
        .unwrap_or(CodecKind::Json);

    if engine_for(kind).delete(file)? {
        println!("✓ State file deleted successfully");
    } else {
        println!("No state file at {}", file.display());
    }

    Ok(())
}

fn format_value(value: &PropertyValue) -> String {
    const MAX_WIDTH: usize = 60;

    let text = value.to_string();
    if text.chars().count() <= MAX_WIDTH {
        text
    } else {
        let truncated: String = text.chars().take(MAX_WIDTH - 3).collect();
        format!("{truncated}...")
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_time(time: std::time::SystemTime) -> String {
    let local: chrono::DateTime<chrono::Local> = time.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_value_truncates() {
        let short = PropertyValue::Int(7);
        assert_eq!(format_value(&short), "7");

        let long = PropertyValue::Text("x".repeat(200));
        let shown = format_value(&long);
        assert_eq!(shown.chars().count(), 60);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn test_resolve_codec_prefers_explicit_choice() {
        let path = Path::new("Settings.json");
        assert_eq!(resolve_codec(None, path).unwrap(), CodecKind::Json);
        assert_eq!(
            resolve_codec(Some(CodecKind::Bincode), path).unwrap(),
            CodecKind::Bincode
        );
        assert!(resolve_codec(None, Path::new("Settings")).is_err());
    }

    #[test]
    fn test_convert_json_to_bincode() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let input = temp_dir.path().join("Settings.json");
        let output = temp_dir.path().join("Settings.bin");
        std::fs::write(&input, r#"{"Theme": "dark", "FontSize": 14}"#).unwrap();

        convert_state(None, None, &input, &output).unwrap();

        let record = load_record(CodecKind::Bincode, &output).unwrap();
        assert_eq!(record.get("Theme"), Some(&PropertyValue::Text("dark".into())));
        assert_eq!(record.get("FontSize"), Some(&PropertyValue::Int(14)));
    }

    #[test]
    fn test_delete_with_force() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let file = temp_dir.path().join("Settings.json");
        std::fs::write(&file, "{}").unwrap();

        delete_state(None, &file, true).unwrap();
        assert!(!file.exists());
    }
}
