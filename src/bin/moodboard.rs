use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use moodboard::{
    DirFetcher, Editor, EditorConfig, MaskMode, NoopListener, Point, Scene, Session,
};

#[derive(Parser, Debug)]
#[command(name = "moodboard", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a scene to PNG and JPEG.
    Export(ExportArgs),
    /// Render the editing surface (headroom included, overlays hidden) to a PNG.
    Preview(PreviewArgs),
    /// Print a summary of a scene.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Scene JSON in the persisted wire format.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory that relative image URLs resolve against (defaults to the scene's directory).
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Editor config JSON. `MOODBOARD_*` environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output PNG path.
    #[arg(long)]
    png: PathBuf,

    /// Output JPEG path.
    #[arg(long)]
    jpeg: Option<PathBuf>,

    /// Polygon mask as canvas points, e.g. "10,10 200,10 100,150".
    #[arg(long)]
    polygon: Option<String>,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Scene JSON in the persisted wire format.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn read_scene(path: &Path) -> anyhow::Result<Scene> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read scene '{}'", path.display()))?;
    let scene = Scene::try_from_json(&text).with_context(|| "parse scene JSON")?;
    Ok(scene)
}

fn open_editor(args: &SceneArgs) -> anyhow::Result<Editor> {
    let config = match &args.config {
        Some(p) => EditorConfig::from_json_file(p)?,
        None => EditorConfig::default(),
    }
    .with_env_overrides();

    let scene = read_scene(&args.in_path)?;
    let assets_root = match &args.assets {
        Some(p) => p.clone(),
        None => args
            .in_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    };

    let mut editor = Editor::new(Session::new("cli"), config, NoopListener)?;
    editor.set_scene(scene);
    editor.pump_loads(&DirFetcher::new(assets_root));
    for url in editor.scene().referenced_urls() {
        if let Some(state) = editor.image_state(&url) {
            tracing::debug!(%url, ?state, "image");
        }
    }
    Ok(editor)
}

fn parse_polygon(s: &str) -> anyhow::Result<Vec<Point>> {
    s.split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .with_context(|| format!("polygon point '{pair}' is not 'x,y'"))?;
            let x: f64 = x.parse().with_context(|| format!("polygon x in '{pair}'"))?;
            let y: f64 = y.parse().with_context(|| format!("polygon y in '{pair}'"))?;
            Ok(Point::new(x, y))
        })
        .collect()
}

fn write_bytes(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut editor = open_editor(&args.scene)?;
    if let Some(poly) = &args.polygon {
        editor.set_mask_mode(MaskMode::Polygon);
        editor.set_polygon_points(parse_polygon(poly)?);
    }
    let out = editor.export_now()?;
    write_bytes(&args.png, &out.png)?;
    if let Some(jpeg) = &args.jpeg {
        write_bytes(jpeg, &out.jpeg)?;
    }
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let mut editor = open_editor(&args.scene)?;
    editor.redraw_if_dirty()?;
    let frame = editor.frame().into_straight();
    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let scene = read_scene(&args.in_path)?;
    match &scene.background {
        Some(bg) => println!(
            "background {} at ({}, {}) size {}x{} rank {:?}",
            bg.source_url, bg.position.x, bg.position.y, bg.size.width, bg.size.height, bg.rank
        ),
        None => println!("background none"),
    }
    println!("layers {}", scene.layers.len());
    for (i, l) in scene.layers.iter().enumerate() {
        println!(
            "  [{i}] {} {} at ({}, {}) size {}x{} rot {}{}{}",
            l.id,
            l.source_url,
            l.position.x,
            l.position.y,
            l.size.width,
            l.size.height,
            moodboard::geometry::display_degrees(l.rotation),
            if l.flip_horizontal { " flipped" } else { "" },
            if l.shadow { " shadow" } else { "" },
        );
    }
    for url in scene.selected_urls() {
        println!("url {url} x{}", scene.instance_count(&url));
    }
    Ok(())
}
