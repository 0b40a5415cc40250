use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "packshot", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a packshot and write the result as a PNG.
    Render(RenderArgs),
    /// Validate a packshot JSON file without rendering.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input packshot JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Asset root directory (defaults to the input file's directory).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Draft quality: the cone tracer samples every other pixel.
    #[arg(long)]
    draft: bool,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input packshot JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn read_packshot_json(path: &Path) -> anyhow::Result<packshot::Packshot> {
    let f = File::open(path).with_context(|| format!("open packshot '{}'", path.display()))?;
    let r = BufReader::new(f);
    let packshot: packshot::Packshot =
        serde_json::from_reader(r).with_context(|| "parse packshot JSON")?;
    Ok(packshot)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let packshot = read_packshot_json(&args.in_path)?;
    packshot.validate()?;

    let root = args
        .root
        .clone()
        .or_else(|| args.in_path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut pipeline = packshot::RenderPipeline::new(packshot::AssetRoot::new(root));
    let report = pipeline.load(&packshot)?;
    for failure in &report.failures {
        eprintln!(
            "warning: layer '{}' failed to load {}: {}",
            failure.layer,
            failure.source.as_deref().unwrap_or("<none>"),
            failure.message
        );
    }

    let quality = if args.draft {
        packshot::RenderQuality::Draft
    } else {
        packshot::RenderQuality::Full
    };
    let surface = pipeline.render(&packshot, quality)?;
    pipeline.dispose();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &surface.to_straight_rgba(),
        surface.width(),
        surface.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let packshot = read_packshot_json(&args.in_path)?;
    packshot.validate()?;
    eprintln!(
        "ok: '{}' ({}x{}, {} layers)",
        packshot.name,
        packshot.config.width,
        packshot.config.height,
        packshot.layers.len()
    );
    Ok(())
}
