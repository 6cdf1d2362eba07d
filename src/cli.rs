//! CLI commands implementation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::{load_settings, Settings};
use crate::models::{Document, PageSelection};
use crate::services::{OcrService, PipelineEvent};

#[derive(Parser)]
#[command(name = "ocrpipe")]
#[command(about = "PDF OCR pipeline with orientation and skew correction")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML settings file
    #[arg(long, global = true, env = "OCRPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Process a PDF document through the full pipeline
    Process {
        /// PDF file to process
        file: PathBuf,
        /// Recognition languages, combined into one pass
        #[arg(long, value_delimiter = ',', env = "OCRPIPE_LANGUAGES")]
        languages: Vec<String>,
        /// Explicit page numbers (takes priority over --from/--to)
        #[arg(long, value_delimiter = ',')]
        pages: Vec<u32>,
        /// First page of a range
        #[arg(long)]
        from: Option<u32>,
        /// Last page of a range, inclusive
        #[arg(long)]
        to: Option<u32>,
        /// Render resolution override
        #[arg(long, env = "OCRPIPE_DPI")]
        dpi: Option<u32>,
        /// Worker count override (0 = one per CPU)
        #[arg(long, env = "OCRPIPE_WORKERS")]
        workers: Option<usize>,
        /// Document deadline override, seconds
        #[arg(long, env = "OCRPIPE_TIMEOUT_SECS")]
        timeout: Option<u64>,
        /// Print the full report as JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// Write the document's word coordinates to this JSON file
        #[arg(long)]
        coords_out: Option<PathBuf>,
    },

    /// Check external tool availability and show the effective config
    Health {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            file,
            languages,
            pages,
            from,
            to,
            dpi,
            workers,
            timeout,
            json,
            coords_out,
        } => {
            let mut settings = settings;
            if let Some(dpi) = dpi {
                settings.render.dpi = dpi;
            }
            if let Some(workers) = workers {
                settings.pipeline.workers = workers;
            }
            if let Some(timeout) = timeout {
                settings.pipeline.timeout_secs = timeout;
            }
            if !languages.is_empty() {
                settings.recognition.languages = languages;
            }

            let selection = if !pages.is_empty() {
                PageSelection::pages(pages)
            } else if from.is_some() || to.is_some() {
                PageSelection::range(from, to)
            } else {
                PageSelection::all()
            };

            process_command(settings, file, selection, json, coords_out).await
        }
        Commands::Health { json } => {
            let service = OcrService::new(settings);
            let health = service.health();
            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
                return Ok(());
            }

            let mark = |ok: bool| {
                if ok {
                    style("✓").green()
                } else {
                    style("✗").red()
                }
            };
            println!(
                "{} {} v{} ({})",
                mark(health.status == "ok"),
                health.service,
                health.version,
                health.status
            );
            match &health.recognition_engine_version {
                Some(v) => println!("  tesseract {}", v),
                None => println!("  tesseract version unknown"),
            }
            println!("  cpu cores: {}", health.cpu_count);
            for tool in &health.tools {
                println!("  {} {}", mark(tool.available), tool.name);
            }
            Ok(())
        }
    }
}

async fn process_command(
    settings: Settings,
    file: PathBuf,
    selection: PageSelection,
    json: bool,
    coords_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown.pdf".to_string());
    let document = Document::new(filename, bytes);

    let service = OcrService::new(settings);
    let params = service.default_params();

    // Progress UI is fed by pipeline events; the quiet JSON mode skips it.
    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(100);
    let ui = if json {
        drop(event_rx);
        None
    } else {
        Some(tokio::spawn(render_progress(event_rx)))
    };

    let result = service
        .submit_with_events(document, selection, params, event_tx)
        .await;
    if let Some(ui) = ui {
        let _ = ui.await;
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                        "error_kind": e.kind(),
                    })
                );
            } else {
                println!("{} {}", style("✗").red(), e);
            }
            anyhow::bail!("processing failed: {}", e);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {} pages in {}ms, mean confidence {:.1}%",
            style("✓").green(),
            report.pages.len(),
            report.processing_time_ms,
            report.mean_confidence()
        );
        for page in &report.pages {
            let status = match &page.error {
                Some(error) => format!("{} {}", style("failed:").red(), error),
                None => format!(
                    "{} chars, confidence {:.0}%",
                    page.text.chars().count(),
                    page.confidence
                ),
            };
            println!(
                "  page {:>3}: {} (rotation {}°, skew {:.1}°, {}ms)",
                page.page_number,
                status,
                page.rotation_applied,
                page.deskew_angle,
                page.processing_time_ms
            );
        }
        if let Some(doc_id) = &report.doc_id {
            println!("  doc_id: {}", doc_id);
        }
    }

    if let Some(path) = coords_out {
        let doc_id = report
            .doc_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("report carries no document id"))?;
        let coords = service
            .coordinates(doc_id)
            .ok_or_else(|| anyhow::anyhow!("coordinates not found for {}", doc_id))?;
        let out = std::fs::File::create(&path)
            .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))?;
        serde_json::to_writer_pretty(out, &coords)?;
        if !json {
            println!("  coordinates written to {}", path.display());
        }
    }

    Ok(())
}

/// Render pipeline events as per-round progress bars plus a summary line
/// per round.
async fn render_progress(mut events: mpsc::Receiver<PipelineEvent>) {
    let mut bar: Option<ProgressBar> = None;
    let mut failed_pages = 0usize;

    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::SplitStarted {
                filename,
                size_bytes,
            } => {
                println!(
                    "{} Splitting {} ({:.2} MB)",
                    style("→").cyan(),
                    filename,
                    size_bytes as f64 / (1024.0 * 1024.0)
                );
            }
            PipelineEvent::SplitCompleted {
                total_pages,
                selected_pages,
                duration_ms,
            } => {
                println!(
                    "{} Split: {} pages, {} selected ({}ms)",
                    style("✓").green(),
                    total_pages,
                    selected_pages,
                    duration_ms
                );
            }
            PipelineEvent::PhaseStarted { phase, total_pages } => {
                let progress = ProgressBar::new(total_pages as u64);
                progress.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                        .unwrap()
                        .progress_chars("█▓░"),
                );
                progress.set_message(format!("{} round...", phase));
                bar = Some(progress);
            }
            PipelineEvent::PageCompleted { .. } => {
                if let Some(progress) = &bar {
                    progress.inc(1);
                }
            }
            PipelineEvent::PageFailed {
                phase,
                page_number,
                error,
            } => {
                failed_pages += 1;
                if let Some(progress) = &bar {
                    progress.inc(1);
                    progress.set_message(format!("page {} {}: {}", page_number, phase, error));
                }
            }
            PipelineEvent::PhaseCompleted {
                phase,
                duration_ms,
                corrected,
            } => {
                if let Some(progress) = bar.take() {
                    progress.finish_and_clear();
                }
                println!(
                    "{} {} round: {} pages affected ({}ms)",
                    style("✓").green(),
                    phase,
                    corrected,
                    duration_ms
                );
            }
            PipelineEvent::Completed { .. } => {
                if failed_pages > 0 {
                    println!(
                        "  {} {} page(s) degraded, see per-page errors",
                        style("!").yellow(),
                        failed_pages
                    );
                }
            }
        }
    }
}
