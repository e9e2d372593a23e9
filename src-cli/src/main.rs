use anyhow::{Context, Result};
use clap::Parser;
use errata_cli::{Cli, Command, CommonArgs};
use errata_core::{CorrelationInputs, MistakeReport, Pipeline, PipelineInputs, Placement};
use errata_domain_eval::{timing_summary, DiffKind};
use errata_domain_score::format_table;
use errata_infra_storage_fs::{write_atomic, FsStorage};
use errata_ports::storage::{SettingsDto, StoragePort};
use errata_ports::types::pitch_name;
use errata_ports::warning::Warnings;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.common.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("errata: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(common: &CommonArgs) -> Result<SettingsDto> {
    let storage = match &common.config {
        Some(path) => FsStorage::with_path(path.clone()),
        None => FsStorage::default(),
    };
    let mut settings = storage
        .load_settings()
        .with_context(|| format!("loading settings from {}", storage.settings_path().display()))?;
    common.apply(&mut settings);
    Ok(settings)
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli.common)?;
    let pipeline = Pipeline::new(settings);
    let mut warnings = Warnings::new();

    match cli.command {
        Command::Table {
            model,
            links,
            notes,
            output,
        } => {
            let model = pipeline.import_midi(&model, "model")?;
            let (table, _) = pipeline.correlate_sources(&links, &notes, &model, &mut warnings)?;
            write_output(&output, format_table(&table).as_bytes())?;
            info!(path = %output.display(), rows = table.rows.len(), "table written");
        }
        Command::Diff {
            model,
            candidate,
            json,
        } => {
            let model = pipeline.import_midi(&model, "model")?;
            let candidate = pipeline.import_midi(&candidate, "candidate")?;
            let parts = pipeline.diff(&model, &candidate, &[], &mut warnings)?;
            if json {
                let timing = timing_summary(&parts, &model.tempo_map, &candidate.tempo_map);
                let report = MistakeReport::build(&parts, &Placement::default(), timing, &warnings);
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_parts(&parts);
            }
        }
        Command::Mark {
            model,
            candidate,
            links,
            notes,
            table,
            pages,
            out_dir,
            report,
        } => {
            let correlation = match (table, links) {
                (Some(table), _) => CorrelationInputs::Table(table),
                (None, Some(links)) => CorrelationInputs::Sources {
                    links,
                    note_logs: notes,
                },
                (None, None) => anyhow::bail!("either --table or --links with --notes is required"),
            };
            let inputs = PipelineInputs {
                model_midi: model,
                candidate_midi: candidate,
                correlation,
                page_images: pages,
            };

            let loaded = pipeline.load(&inputs, &mut warnings)?;
            let output = pipeline.run_loaded(loaded, std::mem::take(&mut warnings))?;

            for page in &output.pages {
                let path = out_dir.join(format!("page-{}.svg", page.index + 1));
                write_output(&path, page.svg.as_bytes())?;
            }
            if let Some(path) = &report {
                write_output(path, &output.report.to_json()?)?;
            }
            info!(
                pages = output.pages.len(),
                mistakes = output.report.counts.mistakes(),
                out_dir = %out_dir.display(),
                "marked pages written"
            );
            warnings = output.warnings;
        }
    }

    surface_warnings(&warnings);
    Ok(())
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    write_atomic(path, data).with_context(|| format!("writing {}", path.display()))
}

fn print_parts(parts: &[errata_domain_eval::DiffPart]) {
    for part in parts {
        let label = part.staff.as_ref().map(|s| s.as_str()).unwrap_or("merged");
        let result = &part.result;
        println!(
            "{label}: {} matched, {} wrong pitch, {} missing, {} extra",
            result.count(DiffKind::Matched),
            result.count(DiffKind::WrongPitch),
            result.count(DiffKind::Missing),
            result.count(DiffKind::Extra),
        );
        for entry in result.mistakes() {
            let expected = entry.model.and_then(|i| part.model.get(i));
            let played = entry.candidate.and_then(|i| part.candidate.get(i));
            match (expected, played) {
                (Some(e), Some(p)) => println!(
                    "  {:<10} tick {:>8}  {} -> {}",
                    format!("{:?}", entry.kind),
                    e.tick,
                    pitch_name(e.pitch),
                    pitch_name(p.pitch)
                ),
                (Some(e), None) => println!(
                    "  {:<10} tick {:>8}  {}",
                    format!("{:?}", entry.kind),
                    e.tick,
                    pitch_name(e.pitch)
                ),
                (None, Some(p)) => println!(
                    "  {:<10} tick {:>8}  {} (played)",
                    format!("{:?}", entry.kind),
                    p.tick,
                    pitch_name(p.pitch)
                ),
                (None, None) => {}
            }
        }
    }
}

fn surface_warnings(warnings: &Warnings) {
    for warning in warnings.iter() {
        warn!("{warning}");
    }
    if !warnings.is_empty() {
        info!(count = warnings.len(), "run finished with warnings");
    }
}
