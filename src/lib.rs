//! Quadmark - quadrilateral text-region annotation
//!
//! Geometry, persistence, and editing-session core of an image annotation
//! tool: four-corner regions with transcribed text, stored per image in a
//! SQLite label database and edited through display-space drag handles.

pub mod config;
pub mod error;
pub mod geometry;
pub mod session;
pub mod storage;
pub mod workspace;

pub use config::{AppConfig, ViewConfig};
pub use error::{AnnotateError, Result};
pub use geometry::{
    canonicalize_order, display_to_pixel, pixel_to_display, Border, DisplayPoint, DisplayQuad,
    DisplayTransform, PixelPoint, PixelQuad, Size,
};
pub use session::{AnnotationSession, RenderedQuad, WorkingRecord};
pub use storage::{AnnotationRecord, AnnotationStore};
pub use workspace::ImageDirectory;
