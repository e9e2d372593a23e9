use clap::{Args, Parser, Subcommand, ValueEnum};
use errata_ports::storage::{ExtraMarkers, OnsetWindow, SettingsDto};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "errata", about = "Mark performance mistakes on an engraved score")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Onset tolerance: `auto`, `auto:<percent>`, `unbounded` or a tick count
    #[arg(long, global = true, value_parser = parse_onset_window)]
    pub onset_window: Option<OnsetWindow>,

    #[arg(long, global = true)]
    pub gap_cost: Option<u32>,

    #[arg(long, global = true)]
    pub wrong_pitch_cost: Option<u32>,

    /// How extra notes are drawn
    #[arg(long, global = true, value_enum)]
    pub extras: Option<ExtrasArg>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Join page annotations and note logs into a correlation table
    Table {
        #[arg(long)]
        model: PathBuf,

        /// Link dump of the engraved PDF
        #[arg(long)]
        links: PathBuf,

        /// One note-event log per staff
        #[arg(long, num_args = 1.., required = true)]
        notes: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Align a rendition against the model and print the differences
    Diff {
        #[arg(long)]
        model: PathBuf,

        #[arg(long)]
        candidate: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Draw the mistakes of a rendition onto the score pages
    Mark {
        #[arg(long)]
        model: PathBuf,

        #[arg(long)]
        candidate: PathBuf,

        #[arg(long, required_unless_present = "table", requires = "notes")]
        links: Option<PathBuf>,

        #[arg(long, num_args = 1..)]
        notes: Vec<PathBuf>,

        /// Correlation table from `errata table`, instead of links and notes
        #[arg(long, conflicts_with_all = ["links", "notes"])]
        table: Option<PathBuf>,

        /// Page images in page order
        #[arg(long = "page", num_args = 1..)]
        pages: Vec<PathBuf>,

        #[arg(long)]
        out_dir: PathBuf,

        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExtrasArg {
    Anchored,
    Omit,
}

impl From<ExtrasArg> for ExtraMarkers {
    fn from(value: ExtrasArg) -> Self {
        match value {
            ExtrasArg::Anchored => ExtraMarkers::Anchored,
            ExtrasArg::Omit => ExtraMarkers::Omit,
        }
    }
}

pub fn parse_onset_window(value: &str) -> Result<OnsetWindow, String> {
    let value = value.trim();
    match value {
        "auto" => return Ok(OnsetWindow::default()),
        "unbounded" => return Ok(OnsetWindow::Unbounded),
        _ => {}
    }
    if let Some(percent) = value.strip_prefix("auto:") {
        let percent = percent
            .trim_end_matches('%')
            .parse()
            .map_err(|_| format!("invalid percentage: {percent}"))?;
        return Ok(OnsetWindow::Auto { percent });
    }
    value
        .parse::<i64>()
        .ok()
        .filter(|ticks| *ticks >= 0)
        .map(OnsetWindow::Ticks)
        .ok_or_else(|| format!("expected auto, auto:<percent>, unbounded or ticks, got {value}"))
}

impl CommonArgs {
    /// Flags given on the command line win over the settings file.
    pub fn apply(&self, settings: &mut SettingsDto) {
        if let Some(window) = self.onset_window {
            settings.onset_window = window;
        }
        if let Some(cost) = self.gap_cost {
            settings.gap_cost = cost;
        }
        if let Some(cost) = self.wrong_pitch_cost {
            settings.wrong_pitch_cost = cost;
        }
        if let Some(extras) = self.extras {
            settings.extras = extras.into();
        }
    }
}
