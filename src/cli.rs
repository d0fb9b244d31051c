//! Command-line interface

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use lapsekit_settings::{ConfigFormat, JobSettings};
use lapsekit_stabilization::{
    render_gcode, GcodeProcessor, GcodeProcessorArgs, ParsePolicy, ProcessingReport,
    SnapshotPlanArgs, StrategyKind,
};

#[derive(Parser)]
#[command(name = "lapsekit")]
#[command(about = "Plan stabilized timelapse snapshots for 3D printer G-code", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute snapshot plans for a G-code file
    Plan {
        /// G-code file to read
        file: PathBuf,

        #[command(flatten)]
        job: JobOptions,

        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Include the rendered G-code of every plan
        #[arg(long)]
        render: bool,
    },

    /// Write the G-code with rendered plans spliced in
    Splice {
        /// G-code file to read
        file: PathBuf,

        #[command(flatten)]
        job: JobOptions,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Inspect the job configuration
    Config {
        /// Print the default configuration as TOML
        #[arg(long)]
        print_default: bool,

        /// Print the default configuration file location
        #[arg(long)]
        path: bool,
    },
}

/// Options shared by every command that runs a job
#[derive(clap::Args, Debug, Clone)]
pub struct JobOptions {
    /// Job configuration file (.toml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the stabilization strategy
    #[arg(long)]
    pub strategy: Option<StrategyArg>,

    /// Abort on the first malformed line
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum StrategyArg {
    Layer,
    Gcode,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Layer => StrategyKind::Layer,
            StrategyArg::Gcode => StrategyKind::Gcode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Run the parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let (verbose, log_json) = (cli.verbose, cli.log_json);
    match cli.command {
        Commands::Plan {
            file,
            job,
            format,
            render,
        } => {
            let settings = load_settings(job.config.as_deref())?;
            init_cli_logging(verbose, log_json, &settings)?;
            let args = job_args(settings, &job);
            let report = run_job(&file, &args)?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let snapshot = render.then_some(&args.snapshot);
            match format {
                OutputFormat::Text => write_text_report(&mut out, &report, snapshot)?,
                OutputFormat::Json => write_json_report(&mut out, &report, snapshot)?,
            }
            out.flush()?;

            if let Some(line_index) = report.aborted_at {
                bail!("job aborted at line {}", line_index + 1);
            }
            Ok(())
        }
        Commands::Splice { file, job, output } => {
            let settings = load_settings(job.config.as_deref())?;
            init_cli_logging(verbose, log_json, &settings)?;
            let args = job_args(settings, &job);
            splice_file(&file, &output, &args)
        }
        Commands::Config {
            print_default,
            path,
        } => {
            if path {
                println!("{}", JobSettings::default_path()?.display());
            }
            if print_default || !path {
                print!(
                    "{}",
                    JobSettings::default().to_string_with_format(ConfigFormat::Toml)?
                );
            }
            Ok(())
        }
    }
}

fn init_cli_logging(verbose: u8, log_json: bool, settings: &JobSettings) -> anyhow::Result<()> {
    let filter = crate::verbosity_filter(verbose, &settings.logging.level);
    crate::init_logging(filter, log_json || settings.logging.json)
}

/// Settings from `path`, or from the default location when it exists
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<JobSettings> {
    if let Some(path) = path {
        return JobSettings::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    match JobSettings::default_path() {
        Ok(path) if path.exists() => JobSettings::load_from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => Ok(JobSettings::default()),
    }
}

/// Processor configuration with command-line overrides applied
pub fn job_args(settings: JobSettings, options: &JobOptions) -> GcodeProcessorArgs {
    let mut args = settings.processor;
    if let Some(strategy) = options.strategy {
        args.stabilization.strategy = strategy.into();
    }
    if options.strict {
        args.parse_policy = ParsePolicy::Strict;
    }
    args
}

/// Run one job over a G-code file
pub fn run_job(path: &Path, args: &GcodeProcessorArgs) -> anyhow::Result<ProcessingReport> {
    let processor =
        GcodeProcessor::new(Arc::new(args.clone())).context("Invalid job configuration")?;
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let report = processor
        .process_reader(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(report)
}

/// Human-readable report
pub fn write_text_report<W: Write>(
    out: &mut W,
    report: &ProcessingReport,
    render: Option<&SnapshotPlanArgs>,
) -> anyhow::Result<()> {
    writeln!(
        out,
        "{}: {} line(s), {} plan(s), {} diagnostic(s)",
        report.job_id,
        report.line_count,
        report.plans.len(),
        report.diagnostics.len()
    )?;

    for plan in &report.plans {
        writeln!(
            out,
            "line {}: {}, {}",
            plan.line_index() + 1,
            plan.trigger.position,
            plan.trigger.verdict
        )?;
        for step in &plan.steps {
            writeln!(out, "    {}", step)?;
        }
        if let Some(args) = render {
            for line in render_gcode(plan, args) {
                writeln!(out, "    | {}", line)?;
            }
        }
    }

    if !report.diagnostics.is_empty() {
        writeln!(out, "diagnostics:")?;
        for diagnostic in &report.diagnostics {
            writeln!(out, "  line {}: {}", diagnostic.line_index + 1, diagnostic)?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a ProcessingReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    rendered: Option<BTreeMap<usize, Vec<String>>>,
}

/// Report as pretty-printed JSON
pub fn write_json_report<W: Write>(
    out: &mut W,
    report: &ProcessingReport,
    render: Option<&SnapshotPlanArgs>,
) -> anyhow::Result<()> {
    let rendered = render.map(|args| {
        report
            .plans
            .iter()
            .map(|plan| (plan.line_index(), render_gcode(plan, args)))
            .collect()
    });
    serde_json::to_writer_pretty(&mut *out, &JsonReport { report, rendered })?;
    writeln!(out)?;
    Ok(())
}

/// Write `input` to `output` with every plan spliced after its trigger line
///
/// Nothing is written when the job aborts.
pub fn splice_file(input: &Path, output: &Path, args: &GcodeProcessorArgs) -> anyhow::Result<()> {
    let content =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    // Raw bytes are written back untouched; only the parsed copy is lossy
    let mut lines: Vec<&[u8]> = content
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect();
    if content.is_empty() || content.ends_with(b"\n") {
        lines.pop();
    }
    let text: Vec<_> = lines
        .iter()
        .map(|line| String::from_utf8_lossy(line))
        .collect();

    let processor =
        GcodeProcessor::new(Arc::new(args.clone())).context("Invalid job configuration")?;
    let report = processor.process_lines(&text);
    if let Some(line_index) = report.aborted_at {
        bail!("job aborted at line {}, nothing written", line_index + 1);
    }

    let file =
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let mut out = BufWriter::new(file);
    for (line, (_, plan)) in lines.iter().zip(report.annotated()) {
        out.write_all(line)?;
        out.write_all(b"\n")?;
        if let Some(plan) = plan {
            for rendered in render_gcode(plan, &args.snapshot) {
                writeln!(out, "{}", rendered)?;
            }
        }
    }
    out.flush()?;

    tracing::info!(
        "Spliced {} plan(s) into {}",
        report.plans.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    const PRINT: &str = "G28\nG90\nM82\nG92 E0\nG1 Z0.2 F3000\nG1 X10 Y10 E1 F1200\nG1 E0\nG1 X15 Y10 F6000\nG1 E1\nG1 X20 Y20 E2 F1200\n";

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plan_arguments() {
        let cli = Cli::try_parse_from([
            "lapsekit", "plan", "print.gcode", "--strategy", "gcode", "--strict", "--format",
            "json", "--render", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Plan {
                job, format, render, ..
            } => {
                assert_eq!(job.strategy, Some(StrategyArg::Gcode));
                assert!(job.strict);
                assert_eq!(format, OutputFormat::Json);
                assert!(render);
            }
            _ => panic!("expected plan command"),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let options = JobOptions {
            config: None,
            strategy: Some(StrategyArg::Gcode),
            strict: true,
        };
        let args = job_args(JobSettings::default(), &options);
        assert_eq!(args.stabilization.strategy, StrategyKind::Gcode);
        assert_eq!(args.parse_policy, ParsePolicy::Strict);
    }

    #[test]
    fn test_splice_inserts_plan_after_trigger() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("print.gcode");
        let output = dir.path().join("out.gcode");
        std::fs::write(&input, PRINT).unwrap();

        splice_file(&input, &output, &GcodeProcessorArgs::default()).unwrap();
        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();

        let camera = lines.iter().position(|l| *l == "M240").unwrap();
        let trigger = lines.iter().position(|l| *l == "G1 X15 Y10 F6000").unwrap();
        assert!(camera > trigger);
        assert_eq!(lines[trigger + 1], "G1 X125 Y210 Z0.2 F6000");
        assert_eq!(lines.last().copied(), Some("G1 X20 Y20 E2 F1200"));
    }

    #[test]
    fn test_splice_keeps_non_utf8_bytes() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("print.gcode");
        let output = dir.path().join("out.gcode");
        let mut content = b"; bed 60\xb0C\r\n".to_vec();
        content.extend_from_slice(PRINT.as_bytes());
        std::fs::write(&input, &content).unwrap();

        let args = GcodeProcessorArgs {
            parse_policy: ParsePolicy::Strict,
            ..Default::default()
        };
        splice_file(&input, &output, &args).unwrap();
        let written = std::fs::read(&output).unwrap();
        assert!(written.starts_with(b"; bed 60\xb0C\n"));
        let text = String::from_utf8_lossy(&written);
        assert!(text.lines().any(|l| l == "M240"));
    }

    #[test]
    fn test_strict_splice_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("print.gcode");
        let output = dir.path().join("out.gcode");
        std::fs::write(&input, format!("G1 X#\n{}", PRINT)).unwrap();

        let args = GcodeProcessorArgs {
            parse_policy: ParsePolicy::Strict,
            ..Default::default()
        };
        assert!(splice_file(&input, &output, &args).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_text_and_json_reports() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("print.gcode");
        std::fs::write(&input, PRINT).unwrap();
        let args = GcodeProcessorArgs::default();
        let report = run_job(&input, &args).unwrap();
        assert_eq!(report.plans.len(), 1);

        let mut text = Vec::new();
        write_text_report(&mut text, &report, Some(&args.snapshot)).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("1 plan(s)"));
        assert!(text.contains("line 8:"));
        assert!(text.contains("    | M240"));

        let mut json = Vec::new();
        write_json_report(&mut json, &report, Some(&args.snapshot)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["plans"].as_array().map(Vec::len), Some(1));
        assert!(value["rendered"]["7"].is_array());
    }

    #[test]
    fn test_missing_config_file_reported() {
        let err = load_settings(Some(Path::new("/nonexistent/job.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
