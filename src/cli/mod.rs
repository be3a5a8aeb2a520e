//! logsift CLI Module
//!
//! Command-line interface for serving the detection endpoint and for running
//! detection on log files. Status output goes to stderr so stdout carries
//! only results and can be piped.

use clap::{Parser, Subcommand};
use colored::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::detection::{split_log_content, DetectionService, DetectorConfig};
use crate::feature_engineering::CharClassification;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(240, 170, 80) }

fn line_box_top()    { eprintln!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { eprintln!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { eprintln!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    eprintln!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    eprintln!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    eprintln!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    eprint!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    eprintln!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    eprintln!();
    eprintln!("  {}", title.white().bold());
    eprintln!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "logsift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Isolation forest anomaly detection for raw log lines")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Model parameters shared by the offline commands
#[derive(clap::Args, Debug, Clone)]
pub struct ModelArgs {
    /// Number of isolation trees
    #[arg(long, default_value = "100")]
    pub ensemble_size: usize,

    /// Rows drawn per tree
    #[arg(long, default_value = "256")]
    pub subsample_size: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Classify letters and digits by ASCII only
    #[arg(long)]
    pub ascii: bool,
}

impl ModelArgs {
    pub fn to_config(&self) -> DetectorConfig {
        let classification = if self.ascii {
            CharClassification::Ascii
        } else {
            CharClassification::Unicode
        };
        DetectorConfig::new()
            .with_ensemble_size(self.ensemble_size)
            .with_subsample_size(self.subsample_size)
            .with_seed(self.seed)
            .with_classification(classification)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the detection server
    Serve {
        /// Server port
        #[arg(short, long, default_value = "5002")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Print the anomalous lines of a log file
    Detect {
        /// Log file (reads stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print `{"anomalies": [...]}` instead of plain lines
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Print the anomaly score and label of every line
    Score {
        /// Log file (reads stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Fixed outlier proportion instead of the 0.5 score baseline
        #[arg(long)]
        contamination: Option<f64>,

        #[command(flatten)]
        model: ModelArgs,
    },
}

// ─── Input ─────────────────────────────────────────────────────────────────────

/// Read log content from a file, or stdin when no path is given, and split it
/// into non-blank lines
pub fn read_log_lines(input: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(split_log_content(&content))
}

fn truncate_line(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let mut out: String = line.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_detect(input: Option<&Path>, json: bool, config: DetectorConfig) -> anyhow::Result<()> {
    config.validate()?;
    section("Detect");

    step_run("Reading log lines");
    let start = Instant::now();
    let lines = read_log_lines(input)?;
    step_done(&format!("{} lines in {:?}", lines.len(), start.elapsed()));

    step_run(&format!(
        "Fitting {} trees",
        config.ensemble_size.to_string().cyan()
    ));
    let start = Instant::now();
    let service = DetectionService::new(config);
    let anomalies = service.detect(&lines)?;
    step_done(&format!("{:?}", start.elapsed()));

    if anomalies.is_empty() {
        step_ok("No anomalies found");
    } else {
        eprintln!(
            "  {} {} of {} lines flagged",
            warn("!"),
            anomalies.len().to_string().bold(),
            lines.len()
        );
    }
    eprintln!();

    if json {
        println!("{}", serde_json::json!({ "anomalies": anomalies }));
    } else {
        for line in &anomalies {
            println!("{}", line);
        }
    }

    Ok(())
}

pub fn cmd_score(
    input: Option<&Path>,
    contamination: Option<f64>,
    config: DetectorConfig,
) -> anyhow::Result<()> {
    let config = config.with_contamination(contamination);
    config.validate()?;
    section("Score");

    let lines = read_log_lines(input)?;
    let service = DetectionService::new(config);
    let result = service.analyze(&lines)?;

    eprintln!(
        "  {}",
        kv("threshold", &format!("{:.4}", result.threshold))
    );
    eprintln!("  {}", dim(&"─".repeat(56)));

    for (i, line) in lines.iter().enumerate() {
        let label = if result.labels[i].is_anomalous() {
            "anomalous"
        } else {
            "normal"
        };
        println!(
            "{:>6}  {:.4}  {:<9}  {}",
            i,
            result.scores[i],
            label,
            truncate_line(line, 80)
        );
    }

    eprintln!();
    step_ok(&format!("{} of {} lines anomalous", result.n_anomalies, lines.len()));
    Ok(())
}

pub async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..Default::default()
    };

    eprintln!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "logsift".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Detect ", &format!("http://{}:{}/detect", host, port)));
    line_box(&kv("Report ", &format!("http://{}:{}/api/detect/report", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", host, port)));
    line_box(&kv("Trees  ", &config.detector.ensemble_size.to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    eprintln!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_detect_args() {
        let cli = Cli::try_parse_from([
            "logsift", "detect", "--input", "app.log", "--json", "--seed", "7", "--ascii",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Detect { input, json, model }) => {
                assert_eq!(input, Some(PathBuf::from("app.log")));
                assert!(json);
                let config = model.to_config();
                assert_eq!(config.seed, 7);
                assert_eq!(config.ensemble_size, 100);
                assert_eq!(config.classification, CharClassification::Ascii);
            }
            _ => panic!("expected detect command"),
        }
    }

    #[test]
    fn test_read_log_lines_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "first\r\n\nsecond\n   \n").unwrap();
        let lines = read_log_lines(Some(file.path())).unwrap();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_log_lines(Some(Path::new("/nonexistent/logsift.log"))).is_err());
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("short", 10), "short");
        assert_eq!(truncate_line("abcdefghij", 5), "abcd…");
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
