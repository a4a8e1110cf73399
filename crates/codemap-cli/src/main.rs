use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use codemap_core::{AnalysisOutput, Analyzer, Config, LanguageRegistry};
use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codemap")]
#[command(about = "Multi-language code graph extraction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a directory and print its records as JSON
    Analyze {
        /// Root directory to analyse
        dir: PathBuf,

        /// Number of parser workers (0 = one per CPU)
        #[arg(long)]
        workers: Option<usize>,

        /// Per-file parse timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Additional directory name to skip (repeatable)
        #[arg(long = "ignore-dir")]
        ignore_dirs: Vec<String>,

        /// Additional extension to skip (repeatable)
        #[arg(long = "ignore-ext")]
        ignore_exts: Vec<String>,

        /// Analyse on the current thread only
        #[arg(long, conflicts_with = "deadline_secs")]
        sequential: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Print `{files, summary}` instead of the bare record list
        #[arg(long)]
        summary: bool,

        /// Abandon the analysis after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Config file to use instead of the default locations
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List supported languages and their extensions
    Languages,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    files: &'a [codemap_core::AnalysisRecord],
    summary: &'a codemap_core::BatchSummary,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            dir,
            workers,
            timeout_ms,
            ignore_dirs,
            ignore_exts,
            sequential,
            pretty,
            summary,
            deadline_secs,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path)
                    .wrap_err_with(|| format!("Failed to load config from {}", path.display()))?,
                None => Config::load().wrap_err("Failed to load configuration")?,
            };
            if let Some(n) = workers {
                config.analysis.workers = n;
            }
            if let Some(ms) = timeout_ms {
                config.analysis.parse_timeout_ms = ms;
            }
            config.walk.ignore_dirs.extend(ignore_dirs);
            config.walk.ignore_extensions.extend(ignore_exts);
            config.validate()?;

            let analyzer = Analyzer::new(config);
            let output = if sequential {
                analyzer.analyze_sequential(&dir)?
            } else if let Some(secs) = deadline_secs {
                analyzer
                    .analyze_with_deadline(&dir, Duration::from_secs(secs))
                    .await?
            } else {
                analyzer.analyze(&dir).await?
            };

            eprint!("{}", output.summary);
            print_output(&output, summary, pretty)?;
        }
        Commands::Languages => {
            let registry = LanguageRegistry::new();
            for (language, extensions) in registry.list() {
                println!(
                    "{:<12} {:<12} {}",
                    language.display_name(),
                    language.grammar_name(),
                    extensions.join(", ")
                );
            }
        }
    }

    Ok(())
}

fn print_output(output: &AnalysisOutput, summary: bool, pretty: bool) -> Result<()> {
    let json = match (summary, pretty) {
        (true, true) => serde_json::to_string_pretty(&SummaryOutput {
            files: &output.records,
            summary: &output.summary,
        })?,
        (true, false) => serde_json::to_string(&SummaryOutput {
            files: &output.records,
            summary: &output.summary,
        })?,
        (false, true) => serde_json::to_string_pretty(&output.records)?,
        (false, false) => serde_json::to_string(&output.records)?,
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_rejects_deadline() {
        let result = Cli::try_parse_from(["codemap", "analyze", ".", "--sequential", "--deadline-secs", "5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "codemap",
            "analyze",
            "src",
            "--deadline-secs",
            "5",
            "--ignore-dir",
            "gen",
            "--ignore-dir",
            "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                dir,
                deadline_secs,
                ignore_dirs,
                sequential,
                ..
            } => {
                assert_eq!(dir, PathBuf::from("src"));
                assert_eq!(deadline_secs, Some(5));
                assert_eq!(ignore_dirs, vec!["gen", "out"]);
                assert!(!sequential);
            }
            Commands::Languages => panic!("expected analyze"),
        }
    }
}
