//! Image directory navigation
//!
//! Lists the images of one directory in file-name order, tracks which one is
//! being annotated, and reads native pixel dimensions for the session.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::geometry::Size;
use crate::storage::AnnotationStore;

/// Images of a directory plus a navigation cursor
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    root: PathBuf,
    images: Vec<String>,
    current: usize,
}

impl ImageDirectory {
    /// Scan `root` for files whose extension is in `extensions` (any case)
    pub fn scan(root: &Path, extensions: &[String]) -> Result<Self> {
        let mut images = Vec::new();

        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
                .unwrap_or(false);
            if !matches {
                continue;
            }

            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                images.push(name.to_string());
            }
        }

        images.sort();
        info!("Found {} images in {:?}", images.len(), root);

        Ok(Self {
            root: root.to_path_buf(),
            images,
            current: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Name of the image under the cursor
    pub fn current(&self) -> Option<&str> {
        self.images.get(self.current).map(String::as_str)
    }

    /// 1-based position of the cursor, for display
    pub fn page(&self) -> usize {
        self.current + 1
    }

    pub fn has_prev(&self) -> bool {
        self.current > 0
    }

    pub fn has_next(&self) -> bool {
        self.current + 1 < self.images.len()
    }

    /// Advance the cursor; stays on the last image
    pub fn next(&mut self) -> Option<&str> {
        if self.has_next() {
            self.current += 1;
        }
        self.current()
    }

    /// Move the cursor back; stays on the first image
    pub fn prev(&mut self) -> Option<&str> {
        if self.has_prev() {
            self.current -= 1;
        }
        self.current()
    }

    /// Jump to a 1-based page; out-of-range pages leave the cursor alone
    pub fn jump(&mut self, page: usize) -> Option<&str> {
        if page >= 1 && page <= self.images.len() {
            self.current = page - 1;
        } else {
            debug!("Ignoring jump to page {} of {}", page, self.images.len());
        }
        self.current()
    }

    /// Move the cursor to an image by name
    pub fn select(&mut self, name: &str) -> Option<&str> {
        if let Some(index) = self.images.iter().position(|n| n == name) {
            self.current = index;
        }
        self.current()
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Native pixel size of an image, read from its header
    pub fn native_size(&self, name: &str) -> Result<Size> {
        let (width, height) = image::image_dimensions(self.image_path(name))?;
        Ok(Size::new(width, height))
    }

    /// Path of the label database kept alongside the images
    pub fn label_db_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Open (creating if needed) the label database of this directory
    pub fn open_store(&self, file_name: &str) -> Result<AnnotationStore> {
        AnnotationStore::open(&self.label_db_path(file_name))
    }
}
