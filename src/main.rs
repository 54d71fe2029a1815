use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use mailpreview::{
    cors_safe_html, optimize, validate, CaptureOverrides, Color, ImageFormat, Rasterizer, ScreenshotConfig,
    ScreenshotConfigOverride, ScreenshotData, ScreenshotPipeline, SoftwareRasterizer,
};

#[derive(Parser, Debug)]
#[command(
    name = "mailpreview",
    version,
    about = "Capture, optimize and validate preview images of newsletter templates"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render an HTML template into a validated preview image
    Capture(CaptureArgs),
    /// Print the template with external images swapped for placeholders
    Rewrite(RewriteArgs),
    /// Check an existing image against the preview limits
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Template HTML file
    input: PathBuf,
    /// Output encoding: png, jpeg or webp
    #[arg(long)]
    format: Option<ImageFormat>,
    /// Lossy quality in 0..=1
    #[arg(long)]
    quality: Option<f32>,
    /// Device pixel ratio
    #[arg(long)]
    scale: Option<f32>,
    #[arg(long)]
    max_width: Option<u32>,
    #[arg(long)]
    max_height: Option<u32>,
    /// Background fill, e.g. #ffffff
    #[arg(long)]
    background: Option<Color>,
    /// JSON file with `capture` and `validation` sections
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the image here instead of printing the data URL
    #[arg(long)]
    out: Option<PathBuf>,
    /// Never fetch external images
    #[arg(long, action = ArgAction::SetTrue)]
    offline: bool,
    /// Render with headless Chrome
    #[cfg(feature = "cdp")]
    #[arg(long, action = ArgAction::SetTrue)]
    chrome: bool,
}

#[derive(Args, Debug)]
struct RewriteArgs {
    /// Template HTML file
    input: PathBuf,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Image file (PNG, JPEG or WebP)
    input: PathBuf,
    /// JSON file with a `validation` section
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run the optimizer before validating
    #[arg(long, action = ArgAction::SetTrue)]
    optimize: bool,
}

/// Contents of a `--config` file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    capture: CaptureOverrides,
    validation: ScreenshotConfigOverride,
}

fn load_config(path: Option<&Path>) -> Result<ConfigFile> {
    let Some(path) = path else {
        return Ok(ConfigFile::default());
    };
    let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

async fn run_capture<R: Rasterizer>(rasterizer: R, args: &CaptureArgs, file: ConfigFile) -> Result<()> {
    let html = fs::read_to_string(&args.input).with_context(|| format!("reading {}", args.input.display()))?;

    let flags = CaptureOverrides {
        format: args.format,
        quality: args.quality,
        scale: args.scale,
        max_width: args.max_width,
        max_height: args.max_height,
        background_color: args.background,
        auto_resize: None,
    };
    // command-line flags win over the config file
    let overrides = CaptureOverrides {
        format: flags.format.or(file.capture.format),
        quality: flags.quality.or(file.capture.quality),
        scale: flags.scale.or(file.capture.scale),
        max_width: flags.max_width.or(file.capture.max_width),
        max_height: flags.max_height.or(file.capture.max_height),
        background_color: flags.background_color.or(file.capture.background_color),
        auto_resize: file.capture.auto_resize,
    };

    let config = ScreenshotConfig::default().merged(&file.validation);
    let pipeline = ScreenshotPipeline::with_config(rasterizer, config);
    let preview = pipeline
        .capture_validated(&html, &overrides)
        .await
        .with_context(|| format!("capturing {}", args.input.display()))?;

    match &args.out {
        Some(out) => {
            let bytes = ScreenshotData::from_data_url(&preview.data_url)?.decoded_bytes()?;
            fs::write(out, bytes).with_context(|| format!("writing {}", out.display()))?;
            info!("Wrote {}", out.display());
            let summary = json!({
                "out": out.display().to_string(),
                "mimeType": preview.mime_type,
                "width": preview.width,
                "height": preview.height,
                "size": preview.size,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&preview)?),
    }
    Ok(())
}

async fn capture(args: CaptureArgs) -> Result<()> {
    let file = load_config(args.config.as_deref())?;

    #[cfg(feature = "cdp")]
    if args.chrome {
        let rasterizer = mailpreview::cdp::CdpRasterizer::new()?;
        return run_capture(rasterizer, &args, file).await;
    }

    let rasterizer = if args.offline {
        SoftwareRasterizer::offline()
    } else {
        mailpreview::default_rasterizer()?
    };
    run_capture(rasterizer, &args, file).await
}

fn rewrite(args: RewriteArgs) -> Result<()> {
    let html = fs::read_to_string(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    println!("{}", cors_safe_html(&html));
    Ok(())
}

fn validate_file(args: ValidateArgs) -> Result<()> {
    let file = load_config(args.config.as_deref())?;
    let config = ScreenshotConfig::default().merged(&file.validation);
    config.check()?;

    let bytes = fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let mut shot = ScreenshotData::from_image_bytes(&bytes)
        .with_context(|| format!("decoding {}", args.input.display()))?;
    if args.optimize {
        shot = optimize(shot, &config)?;
    }

    match validate(&shot, &config) {
        Ok(v) => {
            let summary = json!({
                "valid": true,
                "mimeType": v.mime_type,
                "width": v.width,
                "height": v.height,
                "size": v.size,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(failure) => bail!("{} is not a valid preview: {}", args.input.display(), failure),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Capture(args) => capture(args).await,
        Commands::Rewrite(args) => rewrite(args),
        Commands::Validate(args) => validate_file(args),
    }
}
