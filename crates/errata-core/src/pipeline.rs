use crate::render::{place_markers, render_page, MarkerStyle, RenderError};
use crate::report::MistakeReport;
use errata_domain_eval::{diff_files, timing_summary, DiffConfig, DiffError, DiffPart};
use errata_domain_score::{
    correlate, import_midi_path, read_note_log_path, read_page_links_path, read_table_path,
    CorrelationTable, MidiFile, MidiImportError, NoteLog, NoteLogError, PageLinks, PageLinksError,
    TableError,
};
use errata_ports::storage::SettingsDto;
use errata_ports::types::{PageIndex, StaffId};
use errata_ports::warning::{WarningKind, Warnings};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("page links: {0}")]
    PageLinks(#[from] PageLinksError),
    #[error("note log: {0}")]
    NoteLog(#[from] NoteLogError),
    #[error("midi import ({role}): {source}")]
    MidiImport {
        role: &'static str,
        #[source]
        source: MidiImportError,
    },
    #[error("correlation table: {0}")]
    Table(#[from] TableError),
    #[error("diff: {0}")]
    Diff(#[from] DiffError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
    #[error("page image {path}: {message}")]
    PageImage { path: PathBuf, message: String },
}

/// Where the notated positions come from.
#[derive(Clone, Debug)]
pub enum CorrelationInputs {
    /// A link dump plus one note log per staff.
    Sources { links: PathBuf, note_logs: Vec<PathBuf> },
    /// A table written by an earlier run.
    Table(PathBuf),
}

#[derive(Clone, Debug)]
pub struct PipelineInputs {
    pub model_midi: PathBuf,
    pub candidate_midi: PathBuf,
    pub correlation: CorrelationInputs,
    /// Page images by page index; pages without one get a standalone overlay.
    pub page_images: Vec<PathBuf>,
}

/// Every input read into memory.
#[derive(Clone, Debug)]
pub struct LoadedInputs {
    pub model: MidiFile,
    pub candidate: MidiFile,
    pub table: CorrelationTable,
    pub staves: Vec<StaffId>,
    pub page_images: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedPage {
    pub index: PageIndex,
    pub svg: String,
}

#[derive(Clone, Debug)]
pub struct RunOutput {
    pub table: CorrelationTable,
    pub parts: Vec<DiffPart>,
    pub pages: Vec<RenderedPage>,
    pub report: MistakeReport,
    pub warnings: Warnings,
}

pub struct Pipeline {
    settings: SettingsDto,
}

impl Pipeline {
    pub fn new(settings: SettingsDto) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn import_midi(&self, path: &Path, role: &'static str) -> Result<MidiFile, PipelineError> {
        let midi = import_midi_path(path).map_err(|source| PipelineError::MidiImport { role, source })?;
        info!(
            role,
            ppq = midi.ppq,
            tracks = midi.note_tracks().count(),
            notes = midi.tracks.iter().map(|t| t.notes.len()).sum::<usize>(),
            "midi imported"
        );
        Ok(midi)
    }

    /// Reads the link dump and note logs and joins them against the model.
    pub fn correlate_sources(
        &self,
        links: &Path,
        note_logs: &[PathBuf],
        model: &MidiFile,
        warnings: &mut Warnings,
    ) -> Result<(CorrelationTable, Vec<StaffId>), PipelineError> {
        let links: PageLinks = read_page_links_path(links, warnings)?;
        info!(
            pages = links.pages.len(),
            boxes = links.boxes().count(),
            "page annotations extracted"
        );

        let logs = note_logs
            .iter()
            .map(|path| read_note_log_path(path, model.ppq))
            .collect::<Result<Vec<NoteLog>, _>>()?;
        for log in &logs {
            debug!(staff = %log.staff, entries = log.entries.len(), "note log read");
        }

        let table = correlate(&logs, &links, model, warnings);
        info!(rows = table.rows.len(), staves = logs.len(), "notes correlated");
        Ok((table, logs.into_iter().map(|l| l.staff).collect()))
    }

    pub fn load(&self, inputs: &PipelineInputs, warnings: &mut Warnings) -> Result<LoadedInputs, PipelineError> {
        let model = self.import_midi(&inputs.model_midi, "model")?;
        let candidate = self.import_midi(&inputs.candidate_midi, "candidate")?;

        let (table, staves) = match &inputs.correlation {
            CorrelationInputs::Sources { links, note_logs } => {
                self.correlate_sources(links, note_logs, &model, warnings)?
            }
            CorrelationInputs::Table(path) => {
                let table = read_table_path(path)?;
                let staves = staves_of(&table);
                info!(rows = table.rows.len(), staves = staves.len(), "correlation table read");
                (table, staves)
            }
        };

        let page_images = inputs
            .page_images
            .iter()
            .map(|path| {
                fs::read_to_string(path).map_err(|e| PipelineError::PageImage {
                    path: path.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LoadedInputs {
            model,
            candidate,
            table,
            staves,
            page_images,
        })
    }

    pub fn diff(
        &self,
        model: &MidiFile,
        candidate: &MidiFile,
        staves: &[StaffId],
        warnings: &mut Warnings,
    ) -> Result<Vec<DiffPart>, PipelineError> {
        for (role, midi) in [("model", model), ("candidate", candidate)] {
            if midi.dangling_notes > 0 {
                warnings.push(
                    WarningKind::DanglingNote,
                    None,
                    format!("{role}: {} notes never released, closed at end of track", midi.dangling_notes),
                );
            }
        }

        let cfg = DiffConfig::from_settings(&self.settings);
        let parts = diff_files(model, candidate, staves, &cfg, warnings)?;
        for part in &parts {
            info!(
                staff = part.staff.as_ref().map(|s| s.as_str()).unwrap_or("merged"),
                model = part.model.len(),
                candidate = part.candidate.len(),
                mistakes = part.result.mistakes().count(),
                "part diffed"
            );
        }
        Ok(parts)
    }

    pub fn run(&self, inputs: &PipelineInputs) -> Result<RunOutput, PipelineError> {
        let mut warnings = Warnings::new();
        let loaded = self.load(inputs, &mut warnings)?;
        self.run_loaded(loaded, warnings)
    }

    pub fn run_loaded(&self, loaded: LoadedInputs, mut warnings: Warnings) -> Result<RunOutput, PipelineError> {
        let LoadedInputs {
            model,
            candidate,
            table,
            staves,
            page_images,
        } = loaded;

        let parts = self.diff(&model, &candidate, &staves, &mut warnings)?;
        let timing = timing_summary(&parts, &model.tempo_map, &candidate.tempo_map);

        let style = MarkerStyle::from_settings(&self.settings);
        let placement = place_markers(&parts, &table, &style, &mut warnings);

        let mut pages = Vec::with_capacity(table.pages.len());
        for page in &table.pages {
            let image = page_images.get(page.index).map(String::as_str);
            let svg = render_page(page, placement.on_page(page.index), image, &style)?;
            pages.push(RenderedPage {
                index: page.index,
                svg,
            });
        }
        info!(
            pages = pages.len(),
            markers = placement.markers.len(),
            "pages rendered"
        );

        let report = MistakeReport::build(&parts, &placement, timing, &warnings);
        Ok(RunOutput {
            table,
            parts,
            pages,
            report,
            warnings,
        })
    }
}

fn staves_of(table: &CorrelationTable) -> Vec<StaffId> {
    let mut staves: Vec<StaffId> = Vec::new();
    for row in &table.rows {
        if !staves.contains(&row.staff) {
            staves.push(row.staff.clone());
        }
    }
    staves
}
