//! Annotation Session
//!
//! Binds one image's records to a display transform. The presentation layer
//! drives the session with discrete events (load, select, drag, commit) and
//! reads back display-space render instructions; pixel-space geometry in the
//! store stays the single source of truth.

use tracing::{debug, info};

use crate::config::ViewConfig;
use crate::error::{AnnotateError, Result};
use crate::geometry::{
    canonicalize_order, full_image_quad, DisplayPoint, DisplayQuad, DisplayTransform, PixelQuad,
    Size,
};
use crate::storage::{AnnotationRecord, AnnotationStore};

/// Working copy of one record inside a session
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingRecord {
    pub id: i64,
    /// Last committed corners in pixel space
    pub quad: PixelQuad,
    /// Drag-handle positions on the surface, possibly edited but not committed
    pub display: DisplayQuad,
    pub text: String,
}

/// What the presentation layer draws for one record
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuad {
    pub id: i64,
    pub text: String,
    /// Top-left positions of the four drag handles
    pub handles: DisplayQuad,
    /// Outline vertices, through the handle centers
    pub outline: DisplayQuad,
    /// Whether this is the record being edited
    pub active: bool,
}

#[derive(Debug)]
struct LoadedView {
    image_identity: String,
    native: Size,
    transform: DisplayTransform,
    records: Vec<WorkingRecord>,
    active_id: Option<i64>,
}

impl LoadedView {
    fn position(&self, id: i64) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or(AnnotateError::UnknownRecord(id))
    }

    fn active_position(&self) -> Result<usize> {
        let id = self.active_id.ok_or(AnnotateError::NoActiveSelection)?;
        self.position(id)
    }
}

#[derive(Debug)]
enum SessionState {
    Unloaded,
    Loaded(LoadedView),
}

/// Editing state for a single image view
pub struct AnnotationSession<'s> {
    store: &'s AnnotationStore,
    view: ViewConfig,
    state: SessionState,
}

impl<'s> AnnotationSession<'s> {
    /// Create an unloaded session writing through to `store`
    pub fn new(store: &'s AnnotationStore, view: ViewConfig) -> Self {
        Self {
            store,
            view,
            state: SessionState::Unloaded,
        }
    }

    /// Show `records` of an image, replacing whatever was loaded before.
    ///
    /// On error the previous state is kept.
    pub fn load(
        &mut self,
        image_identity: &str,
        native: Size,
        surface: Size,
        records: Vec<AnnotationRecord>,
        initial_active_id: Option<i64>,
    ) -> Result<()> {
        if let Some(id) = initial_active_id {
            if !records.iter().any(|r| r.id == id) {
                return Err(AnnotateError::UnknownRecord(id));
            }
        }

        let transform = DisplayTransform::fit(native, surface, self.view.border())?;
        let radius = self.view.handle_radius();
        let records: Vec<WorkingRecord> = records
            .into_iter()
            .map(|r| WorkingRecord {
                id: r.id,
                display: transform.to_display(&r.quad, radius),
                quad: r.quad,
                text: r.text,
            })
            .collect();

        info!(
            "Loaded {} with {} records (active: {:?})",
            image_identity,
            records.len(),
            initial_active_id
        );

        self.state = SessionState::Loaded(LoadedView {
            image_identity: image_identity.to_string(),
            native,
            transform,
            records,
            active_id: initial_active_id,
        });
        Ok(())
    }

    /// Query the store for the image's records, then [`load`](Self::load) them
    pub fn load_from_store(
        &mut self,
        image_identity: &str,
        native: Size,
        surface: Size,
        initial_active_id: Option<i64>,
    ) -> Result<()> {
        let records = self.store.get_all(image_identity)?;
        self.load(image_identity, native, surface, records, initial_active_id)
    }

    /// Drop the current image view
    pub fn unload(&mut self) {
        if let SessionState::Loaded(view) = &self.state {
            debug!("Unloaded {}", view.image_identity);
        }
        self.state = SessionState::Unloaded;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SessionState::Loaded(_))
    }

    pub fn image_identity(&self) -> Option<&str> {
        self.loaded().map(|v| v.image_identity.as_str())
    }

    pub fn active_id(&self) -> Option<i64> {
        self.loaded().and_then(|v| v.active_id)
    }

    pub fn transform(&self) -> Option<&DisplayTransform> {
        self.loaded().map(|v| &v.transform)
    }

    pub fn records(&self) -> &[WorkingRecord] {
        self.loaded().map(|v| v.records.as_slice()).unwrap_or(&[])
    }

    /// Choose which record can be dragged; `None` clears the selection
    pub fn set_active(&mut self, id: Option<i64>) -> Result<()> {
        match (&mut self.state, id) {
            (SessionState::Loaded(view), Some(id)) => {
                view.position(id)?;
                view.active_id = Some(id);
            }
            (SessionState::Loaded(view), None) => view.active_id = None,
            (SessionState::Unloaded, Some(id)) => return Err(AnnotateError::UnknownRecord(id)),
            (SessionState::Unloaded, None) => {}
        }
        debug!("Active record: {:?}", id);
        Ok(())
    }

    /// Replace all four display points of the active record
    pub fn drag_update(&mut self, display: DisplayQuad) -> Result<()> {
        let view = self.loaded_mut().ok_or(AnnotateError::NoActiveSelection)?;
        let index = view.active_position()?;
        view.records[index].display = display;
        Ok(())
    }

    /// Move one drag handle of the active record, keeping it on the surface
    pub fn drag_handle(&mut self, handle_index: usize, point: DisplayPoint) -> Result<()> {
        if handle_index >= 4 {
            return Err(AnnotateError::InvalidGeometry(format!(
                "handle index {} out of range",
                handle_index
            )));
        }

        let radius = self.view.handle_radius();
        let view = self.loaded_mut().ok_or(AnnotateError::NoActiveSelection)?;
        let index = view.active_position()?;
        let pinned = view.transform.clamp_handle(point, radius);
        view.records[index].display[handle_index] = pinned;
        Ok(())
    }

    /// Persist the active record's dragged geometry.
    ///
    /// Display points are mapped back to pixel space and put in canonical
    /// order before being written. Returns the stored corners.
    pub fn commit_active(&mut self) -> Result<PixelQuad> {
        let radius = self.view.handle_radius();
        let store = self.store;
        let view = self.loaded_mut().ok_or(AnnotateError::NoActiveSelection)?;
        let index = view.active_position()?;

        let raw = view.transform.to_pixel(&view.records[index].display, radius);
        let quad = canonicalize_order(&raw)?;
        let id = view.records[index].id;
        store.update_quadrilateral(&view.image_identity, id, &quad)?;

        let record = &mut view.records[index];
        record.quad = quad;
        record.display = view.transform.to_display(&quad, radius);
        debug!("Committed record {}: {:?}", id, quad);
        Ok(quad)
    }

    /// Recompute the layout for a new surface size.
    ///
    /// Display geometry is rebuilt from the committed pixel corners, so
    /// uncommitted drags are discarded.
    pub fn resize(&mut self, surface: Size) -> Result<()> {
        let radius = self.view.handle_radius();
        let border = self.view.border();
        let Some(view) = self.loaded_mut() else {
            return Ok(());
        };

        view.transform = DisplayTransform::fit(view.native, surface, border)?;
        for record in &mut view.records {
            record.display = view.transform.to_display(&record.quad, radius);
        }
        debug!("Resized view of {} to {:?}", view.image_identity, surface);
        Ok(())
    }

    /// Replace the text of a loaded record
    pub fn update_text(&mut self, id: i64, text: &str) -> Result<()> {
        let store = self.store;
        let view = self.loaded_mut().ok_or(AnnotateError::UnknownRecord(id))?;
        let index = view.position(id)?;

        store.update_text(&view.image_identity, id, text)?;
        view.records[index].text = text.to_string();
        Ok(())
    }

    /// Create a record covering the whole image and make it active
    pub fn add_record(&mut self) -> Result<i64> {
        let radius = self.view.handle_radius();
        let store = self.store;
        let view = self.loaded_mut().ok_or(AnnotateError::NoImageLoaded)?;

        let quad = full_image_quad(view.native);
        let id = store.add(&view.image_identity, &quad, "")?;
        view.records.push(WorkingRecord {
            id,
            quad,
            display: view.transform.to_display(&quad, radius),
            text: String::new(),
        });
        view.active_id = Some(id);
        info!("Added record {} to {}", id, view.image_identity);
        Ok(id)
    }

    /// Delete a loaded record, clearing the selection if it was active
    pub fn delete_record(&mut self, id: i64) -> Result<()> {
        let store = self.store;
        let view = self.loaded_mut().ok_or(AnnotateError::UnknownRecord(id))?;
        let index = view.position(id)?;

        store.delete(&view.image_identity, id)?;
        view.records.remove(index);
        if view.active_id == Some(id) {
            view.active_id = None;
        }
        info!("Deleted record {} from {}", id, view.image_identity);
        Ok(())
    }

    /// Display-space geometry for every loaded record, in id order
    pub fn render(&self) -> Vec<RenderedQuad> {
        let Some(view) = self.loaded() else {
            return Vec::new();
        };
        let radius = self.view.handle_radius();

        view.records
            .iter()
            .map(|r| RenderedQuad {
                id: r.id,
                text: r.text.clone(),
                handles: r.display,
                outline: r.display.map(|p| p.offset(radius, radius)),
                active: view.active_id == Some(r.id),
            })
            .collect()
    }

    fn loaded(&self) -> Option<&LoadedView> {
        match &self.state {
            SessionState::Loaded(view) => Some(view),
            SessionState::Unloaded => None,
        }
    }

    fn loaded_mut(&mut self) -> Option<&mut LoadedView> {
        match &mut self.state {
            SessionState::Loaded(view) => Some(view),
            SessionState::Unloaded => None,
        }
    }
}
