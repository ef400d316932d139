use std::collections::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use vela_engine::render::{self, CancellationToken, RenderRequest};
use vela_engine::wav::{self, BitDepth, TpdfDither};
use vela_engine::{AudioBuffer, AudioClip};
use vela_playlist::ProjectState;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => run_render(args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Offline rendering tools for Vela Studio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project's master mix, and optionally its stems, to disk.
    Render(RenderArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Path to the project description (JSON).
    #[arg(long)]
    project: PathBuf,
    /// Output path for the master mixdown.
    #[arg(long)]
    out: PathBuf,
    /// Optional directory for per-track stem exports.
    #[arg(long)]
    stems_dir: Option<PathBuf>,
    /// Render start offset, in project-time seconds.
    #[arg(long, default_value_t = 0.0)]
    start: f64,
    /// Render duration, in seconds.
    #[arg(long)]
    duration: f64,
    /// Target sample rate for the offline context.
    #[arg(long, default_value_t = 48_000.0)]
    sample_rate: f32,
    #[arg(long, default_value_t = 512)]
    block_size: usize,
    #[arg(long, value_enum, default_value_t = BitDepthArg::Pcm24)]
    bit_depth: BitDepthArg,
    /// Peak normalization target in dB; ignored with `--no-normalize`.
    #[arg(long, default_value_t = -0.1)]
    normalize_db: f32,
    #[arg(long)]
    no_normalize: bool,
    /// Apply TPDF dither before quantizing to an integer format.
    #[arg(long)]
    dither: bool,
    #[arg(long, default_value_t = 1)]
    dither_seed: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BitDepthArg {
    Pcm16,
    Pcm24,
    Float32,
}

impl From<BitDepthArg> for BitDepth {
    fn from(value: BitDepthArg) -> Self {
        match value {
            BitDepthArg::Pcm16 => BitDepth::Pcm16,
            BitDepthArg::Pcm24 => BitDepth::Pcm24,
            BitDepthArg::Float32 => BitDepth::Float32,
        }
    }
}

/// On-disk project file: the engine's [`ProjectState`] plus a map from each
/// clip's `source_ref` to the WAV file backing it. Decoding beyond WAV is a
/// host concern this tool doesn't take on.
#[derive(Debug, Deserialize)]
struct ProjectManifest {
    #[serde(flatten)]
    project: ProjectState,
    #[serde(default)]
    sources: HashMap<String, PathBuf>,
}

fn load_sources(paths: &HashMap<String, PathBuf>) -> Result<HashMap<String, AudioClip>> {
    let mut sources = HashMap::new();
    for (reference, path) in paths {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open source {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let mut deinterleaved = vec![Vec::new(); channels];

        match spec.sample_format {
            hound::SampleFormat::Float => {
                for (i, sample) in reader.samples::<f32>().enumerate() {
                    deinterleaved[i % channels].push(sample?);
                }
            }
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                for (i, sample) in reader.samples::<i32>().enumerate() {
                    deinterleaved[i % channels].push(sample? as f32 / full_scale);
                }
            }
        }

        sources.insert(
            reference.clone(),
            AudioClip::with_sample_rate(spec.sample_rate as f32, deinterleaved),
        );
    }
    Ok(sources)
}

fn write_wav(
    path: &PathBuf,
    buffer: &AudioBuffer,
    sample_rate: u32,
    depth: BitDepth,
    normalize_db: Option<f32>,
    dither_seed: Option<u64>,
) -> Result<()> {
    let mut channels: Vec<Vec<f32>> = buffer.as_slice().to_vec();
    if let Some(target) = normalize_db {
        wav::normalize(&mut channels, target);
    }
    let dither = dither_seed.map(|seed| TpdfDither::new(seed, depth));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    wav::encode_wav(&mut writer, &channels, sample_rate, depth, dither)
        .with_context(|| format!("failed to encode {}", path.display()))
}

fn run_render(args: RenderArgs) -> Result<()> {
    let manifest_data = fs::read_to_string(&args.project)
        .with_context(|| format!("failed to read project file {}", args.project.display()))?;
    let manifest: ProjectManifest = serde_json::from_str(&manifest_data)
        .with_context(|| format!("{} is not a valid project file", args.project.display()))?;
    let sources = load_sources(&manifest.sources)?;

    let depth: BitDepth = args.bit_depth.into();
    let request = RenderRequest {
        duration_seconds: args.duration,
        start_offset_seconds: args.start,
        target_sample_rate: args.sample_rate,
        block_size: args.block_size,
    };
    let cancel = CancellationToken::new();
    let normalize = if args.no_normalize { None } else { Some(args.normalize_db) };
    let dither_seed = if args.dither { Some(args.dither_seed) } else { None };

    let master = render::render_master(&manifest.project, &sources, &request, &cancel, |p| {
        tracing::info!("master render progress: {:.0}%", p * 100.0);
    })?;
    write_wav(
        &args.out,
        &master,
        args.sample_rate as u32,
        depth,
        normalize,
        dither_seed,
    )?;
    println!("Rendered master mix to {}", args.out.display());

    if let Some(dir) = args.stems_dir {
        let stems = render::render_stems(&manifest.project, &sources, &request, &cancel, |p| {
            tracing::info!("stem render progress: {:.0}%", p * 100.0);
        })?;
        for stem in stems {
            let name = render::sanitize_stem_name(&stem.name);
            let path = dir.join(format!("{}.wav", name));
            write_wav(&path, &stem.buffer, args.sample_rate as u32, depth, normalize, dither_seed)?;
            println!("  Stem: {}", path.display());
        }
    }
    Ok(())
}
