use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use framecast::{
    EncodeProfile, ExportObserver, ExportRequest, Exporter, Fps, FrameSource as _, PatternSource,
    frame_count, time_at,
};

#[derive(Parser, Debug)]
#[command(name = "framecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame of the built-in test pattern as a PNG.
    Frame(FrameArgs),
    /// Export the built-in test pattern to a video file (requires `ffmpeg`
    /// on PATH).
    Export(ExportArgs),
    /// Print the built-in encode profiles as JSON.
    Profiles,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Scene duration in seconds.
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    /// Frame rate (integer frames per second).
    #[arg(long, default_value_t = 60)]
    fps: u32,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Output video path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Scene duration in seconds.
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    /// Encode profile.
    #[arg(long, value_enum, default_value_t = ProfileChoice::H264Yuv420)]
    profile: ProfileChoice,

    /// Override the profile's frame rate (integer frames per second).
    #[arg(long)]
    fps: Option<u32>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileChoice {
    /// MP4 / H264 4:2:0
    H264Yuv420,
    /// MP4 / H264 4:4:4
    H264Yuv444,
    /// MOV / QTRLE (lossless)
    Qtrle,
    /// NUT / FFV1 (lossless)
    Ffv1,
}

impl ProfileChoice {
    fn resolve(self) -> EncodeProfile {
        let index = match self {
            ProfileChoice::H264Yuv420 => 0,
            ProfileChoice::H264Yuv444 => 1,
            ProfileChoice::Qtrle => 2,
            ProfileChoice::Ffv1 => 3,
        };
        EncodeProfile::builtin().remove(index)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Profiles => cmd_profiles(),
    }
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let fps = Fps::new(args.fps, 1)?;
    let total = frame_count(args.duration, fps);
    if args.frame >= total.max(1) {
        anyhow::bail!("frame {} out of range (scene has {} frames)", args.frame, total);
    }

    let mut source = PatternSource::new(args.duration, fps, (args.width, args.height));
    // Reuse the request validation/derivation even though no encoder runs.
    let request = ExportRequest::new(&args.out, args.width, args.height, ProfileChoice::Ffv1.resolve())?;
    let surface = request.surface_for(source.aspect_ratio())?;

    source.acquire(&surface)?;
    let mut frame = vec![0u8; surface.frame_len()];
    let result = source.render(time_at(args.frame, fps), &mut frame);
    source.release();
    result?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame,
        surface.width,
        surface.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

struct ProgressPrinter;

impl ExportObserver for ProgressPrinter {
    fn on_progress(&mut self, fraction: f64) {
        eprint!("\r{:3.0}%", fraction * 100.0);
        let _ = std::io::stderr().flush();
    }

    fn on_complete(&mut self) {
        eprintln!();
    }

    fn on_cancelled(&mut self) {
        eprintln!("\ncancelled");
    }

    fn on_failed(&mut self, _error: &framecast::FramecastError) {
        eprintln!();
    }
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut profile = args.profile.resolve();
    if let Some(fps) = args.fps {
        profile.fps = Fps::new(fps, 1)?;
    }

    let mut source = PatternSource::new(args.duration, profile.fps, (args.width, args.height));
    let request = ExportRequest::new(&args.out, args.width, args.height, profile)?;

    let cancel = framecast::CancelToken::new();
    Exporter::new().export(&mut source, &request, &mut ProgressPrinter, &cancel)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_profiles() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&EncodeProfile::builtin())?;
    println!("{json}");
    Ok(())
}
