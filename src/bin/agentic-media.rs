use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use agentic_media::{
    AppConfig, ClipSettings, ClipSynthesizer, FfmpegRecorder, FontSource, FontTextPainter,
    Orchestrator, ProviderConfig, config::non_blank,
};
use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agentic-media", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve(ServeArgs),
    /// Record the fallback clip for a prompt as WebM (requires `ffmpeg` with libvpx-vp9).
    Clip(ClipArgs),
    /// Render a single fallback clip frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Args, Debug)]
struct FontArgs {
    /// Font file for the clip text. Defaults to a system sans-serif face.
    #[arg(long, env = "AGENTIC_MEDIA_FONT")]
    font: Option<PathBuf>,
}

impl FontArgs {
    fn source(&self) -> FontSource {
        match &self.font {
            Some(path) => FontSource::File(path.clone()),
            None => FontSource::System,
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "AGENTIC_MEDIA_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    replicate_api_token: Option<String>,

    /// Replicate text-to-video model.
    #[arg(
        long,
        env = "REPLICATE_MODEL",
        default_value = agentic_media::config::DEFAULT_REPLICATE_MODEL
    )]
    replicate_model: String,

    #[command(flatten)]
    font: FontArgs,
}

#[derive(Args, Debug)]
struct ClipArgs {
    /// Text to animate.
    #[arg(long)]
    prompt: String,

    /// Output WebM path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    font: FontArgs,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Text to animate.
    #[arg(long)]
    prompt: String,

    /// Clip time of the frame, in milliseconds.
    #[arg(long, default_value_t = 1500.0)]
    at_ms: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    font: FontArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Clip(args) => cmd_clip(args).await,
        Command::Frame(args) => cmd_frame(args),
    }
}

fn synthesizer(font: &FontArgs) -> anyhow::Result<ClipSynthesizer> {
    let clip = ClipSettings::default();
    let painters = FontTextPainter::factory(font.source(), clip.font_size_px);
    Ok(ClipSynthesizer::new(clip, painters, Arc::new(FfmpegRecorder::default()))?)
}

fn ensure_parent_dir(path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let cfg = AppConfig {
        bind: args.bind,
        providers: ProviderConfig {
            openai_api_key: non_blank(args.openai_api_key),
            replicate_api_token: non_blank(args.replicate_api_token),
            replicate_model: args.replicate_model,
            ..ProviderConfig::default()
        },
        clip: ClipSettings::default(),
        font: args.font.source(),
    };
    let orchestrator = Orchestrator::from_config(&cfg).context("configure orchestrator")?;
    agentic_media::server::serve(cfg.bind, Arc::new(orchestrator)).await
}

async fn cmd_clip(args: ClipArgs) -> anyhow::Result<()> {
    let synth = synthesizer(&args.font)?;
    let clip = synth.synthesize(&args.prompt).await?;

    ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, &clip.data)
        .with_context(|| format!("write clip '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} bytes, {} frames, {} chunks)",
        args.out.display(),
        clip.data.len(),
        clip.stats.captured_frames,
        clip.stats.chunk_count
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let synth = synthesizer(&args.font)?;
    let frame = synth.render_still(&args.prompt, args.at_ms)?;
    let rgba = frame.to_opaque_rgba8()?;

    ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &rgba,
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
