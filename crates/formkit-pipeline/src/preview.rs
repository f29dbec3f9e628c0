//! File selection and preview handles
//!
//! Selecting files for an image-set field materializes one temporary preview
//! handle per file and releases the handles of the previous selection for
//! that field. A successful submission releases the selections it started
//! with; a field reselected while the submission ran keeps its new selection.
//! Handles still outstanding when the tracker is dropped are released then.

use dashmap::DashMap;
use formkit_schema::FileHandle;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Temporary local reference to a selected file, used for display only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    /// Wrap a handle string
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Handle as a string, e.g. for an image source
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and releases preview handles
pub trait PreviewSurface: Send + Sync {
    /// Materialize a handle for a file
    fn create(&self, file: &FileHandle) -> PreviewHandle;

    /// Release a handle; releasing twice is a no-op
    fn release(&self, handle: &PreviewHandle);
}

/// In-process preview surface issuing `blob:` style handles
#[derive(Debug, Default)]
pub struct ObjectUrlPreviews {
    live: DashMap<PreviewHandle, String>,
}

impl ObjectUrlPreviews {
    /// Create an empty surface
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles not yet released
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Whether a handle is still live
    #[must_use]
    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(handle)
    }
}

impl PreviewSurface for ObjectUrlPreviews {
    fn create(&self, file: &FileHandle) -> PreviewHandle {
        let handle = PreviewHandle(format!("blob:formkit/{}", uuid::Uuid::new_v4()));
        self.live.insert(handle.clone(), file.name().to_owned());
        handle
    }

    fn release(&self, handle: &PreviewHandle) {
        self.live.remove(handle);
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Selection {
    pub(crate) files: Vec<FileHandle>,
    pub(crate) previews: Vec<PreviewHandle>,
}

/// Selections by field, in selection order
pub(crate) type Selections = IndexMap<String, Selection>;

/// Per-pipeline selection state
pub(crate) struct PreviewTracker {
    surface: Arc<dyn PreviewSurface>,
    selections: Mutex<Selections>,
}

impl PreviewTracker {
    pub(crate) fn new(surface: Arc<dyn PreviewSurface>) -> Self {
        Self {
            surface,
            selections: Mutex::new(IndexMap::new()),
        }
    }

    /// Replace the selection of a field, returning the new handles
    pub(crate) fn select(&self, field: &str, files: Vec<FileHandle>) -> Vec<PreviewHandle> {
        let previews: Vec<PreviewHandle> = files.iter().map(|f| self.surface.create(f)).collect();

        let previous = self.selections.lock().insert(
            field.to_owned(),
            Selection {
                files,
                previews: previews.clone(),
            },
        );

        if let Some(previous) = previous {
            for handle in &previous.previews {
                self.surface.release(handle);
            }
        }

        previews
    }

    pub(crate) fn previews(&self, field: &str) -> Vec<PreviewHandle> {
        self.selections
            .lock()
            .get(field)
            .map(|s| s.previews.clone())
            .unwrap_or_default()
    }

    pub(crate) fn files(&self, field: &str) -> Option<Vec<FileHandle>> {
        self.selections.lock().get(field).map(|s| s.files.clone())
    }

    /// Copy of the current selections
    pub(crate) fn snapshot(&self) -> Selections {
        self.selections.lock().clone()
    }

    /// Release the selections in `snapshot` that were not replaced since
    pub(crate) fn release_unchanged(&self, snapshot: &Selections) {
        let mut released = Vec::new();
        {
            let mut selections = self.selections.lock();
            for (field, taken) in snapshot {
                let unchanged = selections
                    .get(field)
                    .is_some_and(|current| current.previews == taken.previews);
                if let Some(selection) = unchanged.then(|| selections.shift_remove(field)).flatten() {
                    released.push(selection);
                }
            }
        }

        for selection in released {
            for handle in &selection.previews {
                self.surface.release(handle);
            }
        }
    }

    /// Release every handle and forget every selection
    pub(crate) fn release_all(&self) {
        let drained: Vec<Selection> = self.selections.lock().drain(..).map(|(_, s)| s).collect();
        for selection in drained {
            for handle in &selection.previews {
                self.surface.release(handle);
            }
        }
    }
}

impl Drop for PreviewTracker {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileHandle {
        FileHandle::new(name, "image/png", vec![1u8, 2, 3])
    }

    #[test]
    fn reselecting_releases_previous_handles() {
        let surface = Arc::new(ObjectUrlPreviews::new());
        let tracker = PreviewTracker::new(surface.clone());

        let first = tracker.select("photos", vec![file("a.png"), file("b.png")]);
        assert_eq!(surface.live_count(), 2);

        let second = tracker.select("photos", vec![file("c.png")]);
        assert_eq!(surface.live_count(), 1);
        assert!(first.iter().all(|h| !surface.is_live(h)));
        assert!(surface.is_live(&second[0]));
        assert_eq!(tracker.previews("photos"), second);
        assert_eq!(tracker.files("photos").unwrap()[0].name(), "c.png");
    }

    #[test]
    fn fields_are_tracked_separately() {
        let surface = Arc::new(ObjectUrlPreviews::new());
        let tracker = PreviewTracker::new(surface.clone());

        tracker.select("front", vec![file("a.png")]);
        tracker.select("back", vec![file("b.png")]);
        tracker.select("front", vec![]);

        assert_eq!(surface.live_count(), 1);
        assert!(tracker.previews("front").is_empty());
        assert_eq!(tracker.previews("back").len(), 1);
    }

    #[test]
    fn release_all_and_drop_clear_everything() {
        let surface = Arc::new(ObjectUrlPreviews::new());
        let tracker = PreviewTracker::new(surface.clone());
        tracker.select("photos", vec![file("a.png")]);

        tracker.release_all();
        assert_eq!(surface.live_count(), 0);
        assert!(tracker.files("photos").is_none());

        tracker.select("photos", vec![file("b.png")]);
        drop(tracker);
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn release_unchanged_keeps_newer_selections() {
        let surface = Arc::new(ObjectUrlPreviews::new());
        let tracker = PreviewTracker::new(surface.clone());
        tracker.select("front", vec![file("a.png")]);
        tracker.select("back", vec![file("b.png")]);

        let snapshot = tracker.snapshot();
        let newer = tracker.select("back", vec![file("c.png")]);
        tracker.release_unchanged(&snapshot);

        assert!(tracker.files("front").is_none());
        assert_eq!(tracker.previews("back"), newer);
        assert_eq!(surface.live_count(), 1);
        assert!(surface.is_live(&newer[0]));
    }

    #[test]
    fn handles_are_unique() {
        let surface = ObjectUrlPreviews::new();
        let a = surface.create(&file("a.png"));
        let b = surface.create(&file("a.png"));
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("blob:formkit/"));
    }
}
