use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use crate::agents::Tier;
use crate::cli::commands::AuditArgs;
use crate::cli::progress::AuditProgress;
use crate::cli::render::render_summary;
use crate::config::QuorumConfig;
use crate::errors::QuorumError;
use crate::pipeline::AuditPipeline;
use crate::sink::{FileReportSink, OutputFormat};
use crate::source::{ContractSource, ExplorerSourceProvider, FileSourceProvider, SourceProvider};

pub async fn handle_audit(args: AuditArgs, quiet: bool) -> Result<(), QuorumError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let tier: Tier = args.tier.parse()?;

    let source = fetch_source(&args, &config).await?;
    let contract_name = args.name.clone().unwrap_or_else(|| source.name.clone());
    info!(contract = %contract_name, tier = %tier, "Starting audit");

    let mut pipeline = AuditPipeline::from_config(&config)?;
    let sink = build_sink(&args, &config)?;
    if let Some(sink) = &sink {
        pipeline = pipeline.with_sink(Arc::new(sink.clone()));
    }

    let show_progress = !quiet && !args.json;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = pipeline.with_events(show_progress.then_some(tx));
    let progress_task = tokio::spawn(async move {
        if !show_progress {
            return;
        }
        let mut progress = AuditProgress::new();
        while let Some(event) = rx.recv().await {
            progress.handle_event(&event);
        }
        progress.finish();
    });

    let result = pipeline.run_audit(&source.text, &contract_name, tier).await;
    // Dropping the pipeline closes the event channel so the renderer can finish.
    drop(pipeline);
    let _ = progress_task.await;
    let report = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_summary(&report));
        if let Some(sink) = &sink {
            println!("  Report written to {}\n", sink.report_dir(&report.metadata.audit_id).display());
        }
    }
    Ok(())
}

async fn fetch_source(args: &AuditArgs, config: &QuorumConfig) -> Result<ContractSource, QuorumError> {
    match (&args.file, &args.address) {
        (Some(path), _) => FileSourceProvider::load(&PathBuf::from(path)).await,
        (None, Some(address)) => {
            let explorer = ExplorerSourceProvider::new(&config.explorer.clone().unwrap_or_default());
            explorer.fetch_source(address, &args.network).await
        }
        (None, None) => Err(QuorumError::Config("Either --file or --address is required".to_string())),
    }
}

fn build_sink(args: &AuditArgs, config: &QuorumConfig) -> Result<Option<FileReportSink>, QuorumError> {
    if args.no_save {
        return Ok(None);
    }
    let dir = args
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output_dir());
    let format = match args
        .format
        .as_deref()
        .or_else(|| config.output.as_ref().and_then(|o| o.format.as_deref()))
    {
        Some(f) => f.parse::<OutputFormat>()?,
        None => OutputFormat::default(),
    };
    Ok(Some(FileReportSink::new(dir, format)))
}
