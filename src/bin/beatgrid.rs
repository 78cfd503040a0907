use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use beatgrid_timing::analysis::analyze_samples;
use beatgrid_timing::audio::{load_wav, ClickPattern};
use beatgrid_timing::config::{AppConfig, GapRejectPolicy, TimingConfig};
use beatgrid_timing::error::{log_audio_error, log_timing_error};
use beatgrid_timing::grid::{generate_timing_points, OnsetSet, TimingPoint};
use beatgrid_timing::report::{self, ReportFormat};
use beatgrid_timing::testing::synthetic::write_click_fixture;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "beatgrid",
    about = "Generate a minimal set of timing points for an audio file"
)]
struct Cli {
    /// JSON configuration file (missing or invalid files fall back to defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect onsets, seed tempo/anchor and emit timing points for a WAV file
    Analyze {
        audio_file: PathBuf,
        /// Expected BPM; centres the tempo prior on this value
        #[arg(long)]
        bpm_hint: Option<f64>,
        /// Analyse the percussive component only
        #[arg(long)]
        percussion: bool,
        /// Beat tracker tightness
        #[arg(long)]
        tightness: Option<f64>,
        /// Hop length for the onset envelope
        #[arg(long)]
        hop_length: Option<usize>,
        #[command(flatten)]
        timing: TimingArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Reconcile a beat grid against an onset list (JSON array of seconds)
    Reconcile {
        #[arg(long)]
        onsets: PathBuf,
        /// Seed tempo
        #[arg(long)]
        bpm: f64,
        /// Seed anchor (seconds)
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        anchor: f64,
        /// Audio duration (seconds)
        #[arg(long)]
        duration: f64,
        #[command(flatten)]
        timing: TimingArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Write a deterministic click-track WAV
    RenderClick {
        #[arg(long)]
        bpm: f64,
        #[arg(long)]
        duration: f64,
        #[arg(short, long)]
        output: PathBuf,
        /// Time of the first click (seconds)
        #[arg(long, default_value_t = 0.0)]
        offset: f64,
        /// Switch tempo at this time (seconds); requires --to-bpm
        #[arg(long, requires = "to_bpm")]
        change_at: Option<f64>,
        /// Tempo after --change-at
        #[arg(long, requires = "change_at")]
        to_bpm: Option<f64>,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Emit JSON instead of a text table
    #[arg(short, long)]
    json: bool,
    /// Append the average BPM and the tempo seed
    #[arg(short, long)]
    average: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GapPolicyArg {
    Retain,
    Reset,
}

/// Overrides for `TimingConfig`; unset flags keep the file/default value
#[derive(Args, Debug)]
struct TimingArgs {
    #[arg(long)]
    match_window_ms: Option<f64>,
    #[arg(long)]
    decision_window: Option<usize>,
    #[arg(long)]
    min_matches: Option<usize>,
    #[arg(long)]
    persist: Option<usize>,
    #[arg(long)]
    offset_threshold_ms: Option<f64>,
    #[arg(long)]
    drift_slope_ms_per_beat: Option<f64>,
    #[arg(long)]
    bpm_min_change: Option<f64>,
    #[arg(long)]
    phase_divisions: Option<usize>,
    #[arg(long)]
    phase_search_seconds: Option<f64>,
    #[arg(long)]
    min_gap_ms: Option<f64>,
    #[arg(long)]
    max_points: Option<usize>,
    #[arg(long, value_enum)]
    gap_reject_policy: Option<GapPolicyArg>,
}

impl TimingArgs {
    fn apply(&self, timing: &mut TimingConfig) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }
        set(&mut timing.match_window_ms, self.match_window_ms);
        set(&mut timing.decision_window, self.decision_window);
        set(&mut timing.min_matches, self.min_matches);
        set(&mut timing.persist, self.persist);
        set(&mut timing.offset_threshold_ms, self.offset_threshold_ms);
        set(&mut timing.drift_slope_ms_per_beat, self.drift_slope_ms_per_beat);
        set(&mut timing.bpm_min_change, self.bpm_min_change);
        set(&mut timing.phase_divisions, self.phase_divisions);
        set(&mut timing.phase_search_seconds, self.phase_search_seconds);
        set(&mut timing.min_gap_ms, self.min_gap_ms);
        set(&mut timing.max_points, self.max_points);
        if let Some(policy) = self.gap_reject_policy {
            timing.gap_reject_policy = match policy {
                GapPolicyArg::Retain => GapRejectPolicy::Retain,
                GapPolicyArg::Reset => GapRejectPolicy::Reset,
            };
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so stdout only carries reports
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn load_config(path: Option<&Path>) -> AppConfig {
    path.map(AppConfig::load_from_file).unwrap_or_default()
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Analyze {
            audio_file,
            bpm_hint,
            percussion,
            tightness,
            hop_length,
            timing,
            output,
        } => {
            let mut config = config;
            if bpm_hint.is_some() {
                config.tempo.bpm_hint = bpm_hint;
            }
            if percussion {
                config.onset_detection.percussive = true;
            }
            if let Some(tightness) = tightness {
                config.tempo.tightness = tightness;
            }
            if let Some(hop_length) = hop_length {
                config.onset_detection.hop_size = hop_length;
            }
            timing.apply(&mut config.timing);
            run_analyze(&audio_file, &config, &output)
        }
        Commands::Reconcile {
            onsets,
            bpm,
            anchor,
            duration,
            timing,
            output,
        } => {
            let mut timing_config = config.timing;
            timing.apply(&mut timing_config);
            run_reconcile(&onsets, bpm, anchor, duration, &timing_config, &output)
        }
        Commands::RenderClick {
            bpm,
            duration,
            output,
            offset,
            change_at,
            to_bpm,
            sample_rate,
        } => {
            let pattern = ClickPattern {
                bpm,
                offset,
                change: change_at.zip(to_bpm),
            };
            run_render_click(&pattern, duration, sample_rate, &output)
        }
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_analyze(audio_file: &Path, config: &AppConfig, output: &OutputArgs) -> Result<ExitCode> {
    if let Err(err) = config.validate() {
        log_timing_error(&err, "analyze");
        return Err(err).context("invalid configuration");
    }

    let audio = load_wav(audio_file, config.audio.target_sample_rate)
        .inspect_err(|err| log_audio_error(err, "analyze"))
        .with_context(|| format!("loading {}", audio_file.display()))?;

    let analysis = analyze_samples(&audio.samples, audio.sample_rate, config)
        .with_context(|| format!("analysing {}", audio_file.display()))?;

    tracing::info!(
        "{} onsets, {} timing points ({} drift, {} jump)",
        analysis.onsets.len(),
        analysis.timing.points.len(),
        analysis.timing.stats.drift_points,
        analysis.timing.stats.jump_points
    );

    emit_report(&analysis.timing.points, analysis.timing.seed_bpm, output)
}

fn run_reconcile(
    onsets_path: &Path,
    bpm: f64,
    anchor: f64,
    duration: f64,
    timing: &TimingConfig,
    output: &OutputArgs,
) -> Result<ExitCode> {
    let raw = fs::read_to_string(onsets_path)
        .with_context(|| format!("reading onsets from {}", onsets_path.display()))?;
    let times: Vec<f64> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing onsets JSON in {}", onsets_path.display()))?;

    let result = generate_timing_points(&OnsetSet::new(times), bpm, anchor, duration, timing)
        .inspect_err(|err| log_timing_error(err, "reconcile"))
        .context("reconciling onsets")?;

    emit_report(&result.points, result.seed_bpm, output)
}

fn run_render_click(
    pattern: &ClickPattern,
    duration: f64,
    sample_rate: u32,
    output: &Path,
) -> Result<ExitCode> {
    write_click_fixture(output, pattern, duration, sample_rate)
        .inspect_err(|err| log_audio_error(err, "render-click"))
        .with_context(|| format!("writing click track to {}", output.display()))?;
    eprintln!(
        "Wrote {:.2}s click track ({} BPM) to {}",
        duration,
        pattern.bpm,
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn emit_report(points: &[TimingPoint], tempo_seed: f64, output: &OutputArgs) -> Result<ExitCode> {
    let format = if output.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    let rendered = report::render(points, format, output.average, tempo_seed)?;

    match &output.output {
        Some(path) => report::write_report(path, &rendered)
            .inspect_err(|err| log_audio_error(err, "report"))
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{}", rendered),
    }
    Ok(ExitCode::SUCCESS)
}
