//! Quadmark - command-line front end
//!
//! Drives the annotation store and session for one image directory without
//! a GUI: list, add, edit, and delete quadrilateral text regions, and print
//! the display-space geometry a presentation layer would draw.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use quadmark::config::{self, AppConfig};
use quadmark::{
    canonicalize_order, AnnotationRecord, AnnotationSession, ImageDirectory, PixelPoint,
    RenderedQuad,
};

/// Quadmark - annotate quadrilateral text regions in images
#[derive(Parser, Debug)]
#[command(name = "quadmark")]
#[command(about = "Annotate quadrilateral text regions in a directory of images")]
struct Args {
    /// Directory holding the images and their label database
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Configuration file (default: config.toml in the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the images found in the directory
    Images,
    /// Print the records of an image in pixel space
    List {
        image: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add a record covering the whole image
    Add {
        image: String,
        /// Initial text
        #[arg(long, default_value = "")]
        text: String,
    },
    /// Delete a record
    Delete { image: String, id: i64 },
    /// Replace the text of a record
    SetText { image: String, id: i64, text: String },
    /// Replace the corners of a record: x1 y1 x2 y2 x3 y3 x4 y4 in any order
    SetQuad {
        image: String,
        id: i64,
        #[arg(num_args = 8, allow_negative_numbers = true)]
        coords: Vec<i32>,
    },
    /// Print the display-space geometry of an image's records
    Render {
        image: String,
        /// Record to mark as active
        #[arg(long)]
        active: Option<i64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct RecordView {
    id: i64,
    points: [[i32; 2]; 4],
    text: String,
    last_modified: i64,
}

impl From<&AnnotationRecord> for RecordView {
    fn from(record: &AnnotationRecord) -> Self {
        Self {
            id: record.id,
            points: record.quad.map(|p| [p.x, p.y]),
            text: record.text.clone(),
            last_modified: record.last_modified,
        }
    }
}

#[derive(Serialize)]
struct RenderView {
    id: i64,
    active: bool,
    text: String,
    handles: [[i32; 2]; 4],
    outline: [[i32; 2]; 4],
}

impl From<&RenderedQuad> for RenderView {
    fn from(quad: &RenderedQuad) -> Self {
        Self {
            id: quad.id,
            active: quad.active,
            text: quad.text.clone(),
            handles: quad.handles.map(|p| [p.x, p.y]),
            outline: quad.outline.map(|p| [p.x, p.y]),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_or_create_config(args.config.as_deref())?;

    let images = ImageDirectory::scan(&args.dir, &config.images.extensions)
        .with_context(|| format!("Failed to scan {:?}", args.dir))?;
    let store = images
        .open_store(&config.storage.database_file)
        .context("Failed to open label database")?;

    match args.command {
        Command::Images => {
            for (i, name) in images.images().iter().enumerate() {
                println!("{:>4}  {}", i + 1, name);
            }
        }
        Command::List { image, json } => {
            let records = store.get_all(&image)?;
            if json {
                let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                for record in &records {
                    println!("{:>6}  {:?}  {:?}", record.id, record.quad, record.text);
                }
            }
        }
        Command::Add { image, text } => {
            let native = images.native_size(&image)?;
            let mut session = AnnotationSession::new(&store, config.view);
            session.load_from_store(&image, native, config.view.surface(), None)?;
            let id = session.add_record()?;
            if !text.is_empty() {
                session.update_text(id, &text)?;
            }
            println!("{}", id);
        }
        Command::Delete { image, id } => {
            require_record(&store, &image, id)?;
            store.delete(&image, id)?;
            info!("Deleted record {} from {}", id, image);
        }
        Command::SetText { image, id, text } => {
            require_record(&store, &image, id)?;
            store.update_text(&image, id, &text)?;
        }
        Command::SetQuad { image, id, coords } => {
            require_record(&store, &image, id)?;
            let points: Vec<PixelPoint> = coords
                .chunks(2)
                .map(|c| PixelPoint::new(c[0], c[1]))
                .collect();
            let quad = canonicalize_order(&points)?;
            store.update_quadrilateral(&image, id, &quad)?;
            println!("{:?}", quad);
        }
        Command::Render {
            image,
            active,
            json,
        } => {
            let native = images.native_size(&image)?;
            let mut session = AnnotationSession::new(&store, config.view);
            session.load_from_store(&image, native, config.view.surface(), active)?;
            let rendered = session.render();
            if json {
                let views: Vec<RenderView> = rendered.iter().map(RenderView::from).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                for quad in &rendered {
                    let marker = if quad.active { "*" } else { " " };
                    println!("{}{:>6}  {:?}  {:?}", marker, quad.id, quad.outline, quad.text);
                }
            }
        }
    }

    store.close()?;
    Ok(())
}

/// Fail with a readable message when the record is not under this image
fn require_record(store: &quadmark::AnnotationStore, image: &str, id: i64) -> Result<()> {
    if store.get(image, id)?.is_none() {
        bail!("No record {} for image {}", id, image);
    }
    Ok(())
}

/// Load configuration from the given path, the user config dir, or defaults
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = quadmark::storage::get_config_dir() {
        if let Some(config) = load_user_config(&config_dir.join("config.toml")) {
            return Ok(config);
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Config from the user config directory; a broken file is reported and skipped
fn load_user_config(config_path: &Path) -> Option<AppConfig> {
    if !config_path.exists() {
        return None;
    }
    match config::load_config(config_path) {
        Ok(config) => {
            info!("Loaded configuration from {:?}", config_path);
            Some(config)
        }
        Err(e) => {
            warn!("Ignoring unreadable config {:?}: {:#}", config_path, e);
            None
        }
    }
}
