use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tascii::{list_devices, AppConfig, CancelFlag, GlyphPalette, PlaybackJob};

fn load_config() -> Result<AppConfig> {
    // Look for tascii.json in app support, current dir fallback, then
    // built-in defaults.
    let mut tried: Vec<PathBuf> = Vec::new();
    if let Some(mut d) = dirs::data_dir() {
        d.push("tascii");
        d.push("tascii.json");
        tried.push(d);
    }
    tried.push(PathBuf::from("tascii.json"));

    for p in &tried {
        if p.exists() {
            let text =
                fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
            let cfg: AppConfig = serde_json::from_str(&text).context("parsing config json")?;
            if cfg.glyphs.is_empty() {
                return Err(anyhow!(
                    "Config file {} has an empty glyphs field; at least one glyph is required.",
                    p.display()
                ));
            }
            return Ok(cfg);
        }
    }

    Ok(AppConfig::default())
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available compute devices (CPU and accelerators)
    Devices,
}

#[derive(Parser, Debug)]
#[command(version, about = "Play a video in the terminal as glyph frames.")]
struct Args {
    /// Optional subcommands
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Input video file
    input: Option<PathBuf>,

    /// Compute device: "cpu" or an accelerator name substring
    /// (case-insensitive, optional "accelerator:" prefix)
    #[arg(long)]
    device: Option<String>,

    /// Output width in characters
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    width: Option<u32>,

    /// Per-frame delay in seconds (default: derived from the source frame
    /// rate)
    #[arg(long)]
    delay: Option<f64>,

    /// Glyph ramp from darkest to brightest
    #[arg(long)]
    glyphs: Option<String>,

    /// Restart from the first frame at end of stream until interrupted
    #[arg(long = "loop", default_value_t = false)]
    looping: bool,

    /// Do not extract or play the audio track
    #[arg(long, default_value_t = false)]
    mute: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(Command::Devices) = &args.cmd {
        for device in list_devices() {
            println!("{device}");
        }
        return Ok(());
    }

    let input = args
        .input
        .ok_or_else(|| anyhow!("No input video given. Usage: tascii <INPUT> [options]"))?;

    let cfg = load_config()?;
    let glyphs = args.glyphs.as_deref().unwrap_or(&cfg.glyphs);
    let palette = GlyphPalette::new(glyphs)
        .map_err(|_| anyhow!("Glyph ramp must contain at least one character."))?;

    let job = PlaybackJob::new(input)
        .with_width(args.width.unwrap_or(cfg.width))
        .with_device(args.device)
        .with_delay(args.delay.or(cfg.delay))
        .with_palette(palette)
        .looping(args.looping)
        .with_audio(!args.mute);

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())
            .context("installing ctrl-c handler")?;
    }

    // Pre-load progress bar, initialized lazily on the first callback so
    // streaming runs never show it.
    let progress_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    let pb_clone = Arc::clone(&progress_bar);

    tascii::player::play(&job, &cancel, move |loaded, total| {
        let mut pb_guard = pb_clone.lock().unwrap();
        let pb = pb_guard.get_or_insert_with(|| {
            if total > 0 {
                let pb = ProgressBar::new(total);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} loading frames [{bar:40.cyan/blue}] {pos}/{len}")
                        .unwrap()
                        .progress_chars("#>-"),
                );
                pb
            } else {
                ProgressBar::new_spinner().with_message("loading frames")
            }
        });
        pb.set_position(loaded);
    })
    .with_context(|| format!("playing {}", job.source.display()))?;

    let pb_opt = progress_bar.lock().unwrap().take();
    if let Some(pb) = pb_opt {
        pb.finish_and_clear();
    }

    if cancel.is_cancelled() {
        println!("\nPlayback cancelled.");
    }
    Ok(())
}
