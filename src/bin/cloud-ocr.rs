//! CLI binary for cloud-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ClientConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use cloud_ocr::{
    ArchiveConfig, CancellationToken, ClientConfig, OcrClient, ProcessProgressCallback,
    ProcessRequest, ProcessingVariant, ProgressCallback, TaskRecord, TaskResult,
};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner per document, all stacked in a [`MultiProgress`].
struct CliProgressCallback {
    multi: MultiProgress,
    spinners: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            multi: MultiProgress::new(),
            spinners: Mutex::new(HashMap::new()),
        })
    }

    /// Create the spinner for `source` before any request goes out.
    fn track(&self, source: &Path) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(style);
        bar.set_prefix(display_name(source));
        bar.set_message("uploading…");
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut spinners) = self.spinners.lock() {
            spinners.insert(source.to_path_buf(), bar);
        }
    }

    fn with_bar(&self, source: &Path, f: impl FnOnce(&ProgressBar)) {
        if let Ok(spinners) = self.spinners.lock() {
            if let Some(bar) = spinners.get(source) {
                f(bar);
            }
        }
    }

    fn finish(&self, source: &Path, line: String) {
        let bar = self
            .spinners
            .lock()
            .ok()
            .and_then(|mut spinners| spinners.remove(source));
        if let Some(bar) = bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.multi.println(line).ok();
    }
}

impl ProcessProgressCallback for CliProgressCallback {
    fn on_submitted(&self, source: &Path, task: &TaskRecord) {
        let eta = task
            .estimated_processing_time
            .map(|s| format!("  ~{s}s"))
            .unwrap_or_default();
        self.with_bar(source, |bar| {
            bar.set_message(format!("task {} {}{}", dim(task.id.as_str()), task.status, eta))
        });
    }

    fn on_poll(&self, source: &Path, task: &TaskRecord, attempt: u32) {
        self.with_bar(source, |bar| {
            bar.set_message(format!(
                "task {} {}  {}",
                dim(task.id.as_str()),
                task.status,
                dim(&format!("poll #{attempt}"))
            ))
        });
    }

    fn on_download_start(&self, source: &Path, _task: &TaskRecord) {
        self.with_bar(source, |bar| bar.set_message("downloading…"));
    }

    fn on_complete(&self, source: &Path, task: &TaskRecord, artifact_len: usize) {
        self.finish(
            source,
            format!(
                "  {} {}  {}  {}",
                green("✓"),
                display_name(source),
                dim(task.id.as_str()),
                dim(&format!("{artifact_len} bytes")),
            ),
        );
    }

    fn on_failed(&self, source: &Path, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.finish(
            source,
            format!("  {} {}  {}", red("✗"), display_name(source), red(&msg)),
        );
    }
}

fn display_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise one image, text to stdout
  cloud-ocr --param language=English --param exportFormat=txt scan.png

  # Receipt recognition to a file
  cloud-ocr --variant receipt --param country=usa receipt.jpg -o receipt.xml

  # A batch, four at a time, one artifact per input in out/
  cloud-ocr -c 4 --param exportFormat=pdfSearchable pages/*.tif -o out/

  # Keep a copy of each source in S3 before recognition
  cloud-ocr --archive-bucket scans --archive-prefix inbox/ scan.png

  # JSON summary (task record, archive outcome, timings)
  cloud-ocr --json scan.png > result.json

VARIANTS:
  image (default), business-card, text-field, barcode-field,
  checkmark-field, fields, mrz, receipt

ENVIRONMENT VARIABLES:
  CLOUD_OCR_APPLICATION_ID        Service application id
  CLOUD_OCR_APPLICATION_PASSWORD  Service application password
  CLOUD_OCR_BASE_URL              Service endpoint (default https://cloud.ocrsdk.com)
  AWS_ACCESS_KEY_ID               Archive credentials
  AWS_SECRET_ACCESS_KEY           Archive credentials
  AWS_REGION                      Archive region when --archive-region is not set
  RUST_LOG                        Override log filter (e.g. cloud_ocr=debug)
"#;

/// Recognise documents with a cloud OCR service.
#[derive(Parser, Debug)]
#[command(
    name = "cloud-ocr",
    version,
    about = "Recognise documents with a cloud OCR service",
    long_about = "Submit local documents to a cloud OCR service, wait for each recognition \
task to finish and save the result. Optionally archives each source document to \
S3-compatible storage first.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document paths.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Service application id.
    #[arg(long, env = "CLOUD_OCR_APPLICATION_ID")]
    app_id: String,

    /// Service application password.
    #[arg(long, env = "CLOUD_OCR_APPLICATION_PASSWORD", hide_env_values = true)]
    password: String,

    /// Processing variant.
    #[arg(long, env = "CLOUD_OCR_VARIANT", value_enum, default_value = "image")]
    variant: VariantArg,

    /// Extra query parameter for the submission, KEY=VALUE. Repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Output file (one input) or directory (several inputs). Stdout if unset.
    #[arg(short, long, env = "CLOUD_OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Archive each source document to this S3 bucket before recognition.
    #[arg(long, env = "CLOUD_OCR_ARCHIVE_BUCKET")]
    archive_bucket: Option<String>,

    /// Key prefix inside the archive bucket.
    #[arg(long, env = "CLOUD_OCR_ARCHIVE_PREFIX")]
    archive_prefix: Option<String>,

    /// Archive bucket region.
    #[arg(long, env = "CLOUD_OCR_ARCHIVE_REGION")]
    archive_region: Option<String>,

    /// Custom S3-compatible endpoint (MinIO, R2, ...).
    #[arg(long, env = "CLOUD_OCR_ARCHIVE_ENDPOINT")]
    archive_endpoint: Option<String>,

    /// Seconds between status polls (minimum 2).
    #[arg(long, env = "CLOUD_OCR_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,

    /// Give up on a task after this many seconds (0 = wait forever).
    #[arg(long, env = "CLOUD_OCR_TIMEOUT", default_value_t = 600)]
    timeout: u64,

    /// Service base URL.
    #[arg(long, env = "CLOUD_OCR_BASE_URL")]
    base_url: Option<String>,

    /// Number of documents processed concurrently.
    #[arg(short, long, env = "CLOUD_OCR_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Output a JSON summary per document instead of the artifact.
    #[arg(long, env = "CLOUD_OCR_JSON")]
    json: bool,

    /// Disable progress spinners.
    #[arg(long, env = "CLOUD_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CLOUD_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CLOUD_OCR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    Image,
    BusinessCard,
    TextField,
    BarcodeField,
    CheckmarkField,
    Fields,
    Mrz,
    Receipt,
}

impl From<VariantArg> for ProcessingVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Image => ProcessingVariant::Image,
            VariantArg::BusinessCard => ProcessingVariant::BusinessCard,
            VariantArg::TextField => ProcessingVariant::TextField,
            VariantArg::BarcodeField => ProcessingVariant::BarcodeField,
            VariantArg::CheckmarkField => ProcessingVariant::CheckmarkField,
            VariantArg::Fields => ProcessingVariant::Fields,
            VariantArg::Mrz => ProcessingVariant::Mrz,
            VariantArg::Receipt => ProcessingVariant::Receipt,
        }
    }
}

/// Where each artifact goes.
enum OutputTarget {
    Stdout,
    File(PathBuf),
    Directory(PathBuf),
}

impl OutputTarget {
    fn from_cli(output: Option<&Path>, inputs: usize) -> Self {
        match output {
            None => OutputTarget::Stdout,
            Some(p) if inputs > 1 || p.is_dir() => OutputTarget::Directory(p.to_path_buf()),
            Some(p) => OutputTarget::File(p.to_path_buf()),
        }
    }

    fn path_for(&self, source: &Path) -> Option<PathBuf> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::File(p) => Some(p.clone()),
            OutputTarget::Directory(dir) => {
                // Full file name, so scan.png and scan.tif stay apart.
                let name = source
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "result".to_string());
                Some(dir.join(format!("{name}.result")))
            }
        }
    }
}

/// Refuse a run in which two inputs would write the same output file.
fn check_distinct_targets(target: &OutputTarget, inputs: &[PathBuf]) -> Result<()> {
    let mut seen = HashSet::new();
    for input in inputs {
        if let Some(path) = target.path_for(input) {
            if !seen.insert(path.clone()) {
                bail!(
                    "{} would overwrite the output of another input ({}); \
                     rename the input or process it separately",
                    input.display(),
                    path.display()
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinners are active;
    // they provide all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build client ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as Arc<dyn ProcessProgressCallback>),
    )?;
    let client = OcrClient::new(&cli.app_id, &cli.password, config)
        .context("Failed to create OCR client")?;

    // ── Ctrl-C cancels everything in flight ──────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{} interrupted, cancelling…", cyan("⚠"));
                cancel.cancel();
            }
        });
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let target = OutputTarget::from_cli(cli.output.as_deref(), cli.inputs.len());
    check_distinct_targets(&target, &cli.inputs)?;
    let variant: ProcessingVariant = cli.variant.into();

    let outcomes: Vec<(PathBuf, Result<TaskResult>)> = stream::iter(cli.inputs.iter().cloned())
        .map(|input| {
            let client = client.clone();
            let cancel = cancel.clone();
            let progress = progress.clone();
            let target = &target;
            async move {
                if let Some(ref cb) = progress {
                    cb.track(&input);
                }
                let request = ProcessRequest::new(&input).variant(variant);
                let result = match target.path_for(&input) {
                    Some(path) => {
                        client
                            .process_to_file_cancellable(request, &path, &cancel)
                            .await
                    }
                    None => client.process_cancellable(request, &cancel).await,
                };
                let result =
                    result.with_context(|| format!("Failed to process {}", input.display()));
                (input, result)
            }
        })
        .buffer_unordered(cli.concurrency.max(1))
        .collect()
        .await;

    // ── Report ───────────────────────────────────────────────────────────
    let mut failed = 0usize;
    for (input, outcome) in &outcomes {
        match outcome {
            Ok(result) => report_success(&cli, &target, result)?,
            Err(e) => {
                failed += 1;
                if !cli.quiet {
                    eprintln!("{} {}: {:#}", red("✗"), input.display(), e);
                }
            }
        }
    }

    if !cli.quiet && !cli.json {
        let ok = outcomes.len() - failed;
        eprintln!(
            "{} {}/{} documents recognised",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&ok.to_string()),
            outcomes.len()
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} documents failed", outcomes.len());
    }
    Ok(())
}

fn report_success(cli: &Cli, target: &OutputTarget, result: &TaskResult) -> Result<()> {
    if let Some(warning) = result.archive.warning() {
        if !cli.quiet {
            eprintln!("{} archive: {}", cyan("⚠"), warning);
        }
    }

    if cli.json {
        let json = serde_json::to_string(result).context("Failed to serialise result")?;
        println!("{json}");
        return Ok(());
    }

    match target.path_for(&result.source) {
        Some(path) => {
            if !cli.quiet {
                eprintln!(
                    "{}  {}  {} polls  {}ms  →  {}",
                    green("✔"),
                    result.source.display(),
                    result.stats.polls,
                    result.stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&result.artifact)
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !result.artifact.ends_with(b"\n") {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .max_wait((cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)))
        .url_params(cli.params.iter().cloned());

    if let Some(ref base_url) = cli.base_url {
        builder = builder.base_url(base_url);
    }

    if let Some(ref bucket) = cli.archive_bucket {
        let mut archive = ArchiveConfig::new(bucket);
        archive.prefix = cli.archive_prefix.clone();
        archive.region = cli.archive_region.clone();
        archive.endpoint = cli.archive_endpoint.clone();
        builder = builder.archive(archive).upload_to_archive(true);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--param KEY=VALUE`.
fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<PathBuf> {
        raw.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn directory_target_keeps_the_extension() {
        let target = OutputTarget::Directory(PathBuf::from("out"));
        assert_eq!(
            target.path_for(Path::new("pages/scan.png")),
            Some(PathBuf::from("out/scan.png.result"))
        );
        let inputs = paths(&["scan.png", "scan.tif"]);
        assert!(check_distinct_targets(&target, &inputs).is_ok());
    }

    #[test]
    fn same_file_name_in_two_folders_is_refused() {
        let target = OutputTarget::Directory(PathBuf::from("out"));
        let inputs = paths(&["a/x.png", "b/x.png"]);
        let err = check_distinct_targets(&target, &inputs).unwrap_err();
        assert!(err.to_string().contains("b/x.png"), "{err}");
    }

    #[test]
    fn stdout_and_single_file_targets_never_collide() {
        let inputs = paths(&["a/x.png", "b/x.png"]);
        assert!(check_distinct_targets(&OutputTarget::Stdout, &inputs).is_ok());
        let file = OutputTarget::File(PathBuf::from("out.txt"));
        assert!(check_distinct_targets(&file, &paths(&["x.png"])).is_ok());
    }

    #[test]
    fn document_variant_is_rejected() {
        let parsed = Cli::try_parse_from([
            "cloud-ocr", "--app-id", "app", "--password", "pw", "--variant", "document", "x.png",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from([
            "cloud-ocr", "--app-id", "app", "--password", "pw", "--variant", "business-card",
            "x.png",
        ])
        .unwrap();
        assert_eq!(ProcessingVariant::from(cli.variant), ProcessingVariant::BusinessCard);
    }
}
