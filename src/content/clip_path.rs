//! Clip paths: intersected path regions plus clipping text.
//!
//! A clip path is shared between graphics states until one of them changes
//! it, so the data lives behind an `Rc` and is copied on write.

use crate::content::page_object::PageObject;
use crate::content::path::{FillType, Path};
use crate::geometry::{Matrix, Rect};
use std::rc::Rc;

/// Upper bound on clipping text objects kept in one clip path.
const MAX_CLIP_TEXTS: usize = 1024;

#[derive(Debug, Clone, Default)]
struct ClipData {
    paths: Vec<(Path, FillType)>,
    // `None` ends one text group (one `BT`..`ET` block)
    texts: Vec<Option<Rc<PageObject>>>,
}

impl PartialEq for ClipData {
    fn eq(&self, other: &Self) -> bool {
        self.paths == other.paths
            && self.texts.len() == other.texts.len()
            && self.texts.iter().zip(&other.texts).all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            })
    }
}

/// The clip region of a graphics state.
///
/// An empty (default) clip path does not clip at all.
#[derive(Debug, Clone, Default)]
pub struct ClipPath {
    data: Option<Rc<ClipData>>,
}

impl PartialEq for ClipPath {
    fn eq(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b) || a == b,
            (None, None) => true,
            _ => false,
        }
    }
}

impl ClipPath {
    /// Create a clip path that does not clip.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.data
            .as_ref()
            .map_or(true, |d| d.paths.is_empty() && d.texts.is_empty())
    }

    fn make_mut(&mut self) -> &mut ClipData {
        Rc::make_mut(self.data.get_or_insert_with(Default::default))
    }

    /// Number of clip paths.
    pub fn path_count(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.paths.len())
    }

    /// A clip path and its fill rule.
    pub fn path(&self, index: usize) -> Option<(&Path, FillType)> {
        self.data
            .as_ref()
            .and_then(|d| d.paths.get(index))
            .map(|(p, f)| (p, *f))
    }

    /// Number of text entries, group separators included.
    pub fn text_count(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.texts.len())
    }

    /// A clipping text object, or `None` for a group separator.
    pub fn text(&self, index: usize) -> Option<&Rc<PageObject>> {
        self.data
            .as_ref()
            .and_then(|d| d.texts.get(index))
            .and_then(|t| t.as_ref())
    }

    /// Intersect with a path.
    ///
    /// With `auto_merge`, a rectangle that already contains the new path is
    /// dropped first since it no longer restricts anything.
    pub fn append_path(&mut self, path: Path, fill: FillType, auto_merge: bool) {
        let data = self.make_mut();
        if auto_merge {
            if let Some((last, _)) = data.paths.last() {
                if let Some(old_rect) = last.as_rect() {
                    if old_rect.contains(&path.bounding_box()) {
                        data.paths.pop();
                    }
                }
            }
        }
        data.paths.push((path, fill));
    }

    /// Intersect with a group of clipping text objects.
    pub fn append_texts(&mut self, texts: Vec<Rc<PageObject>>) {
        let data = self.make_mut();
        if data.texts.len() + texts.len() > MAX_CLIP_TEXTS {
            log::debug!("Too many clipping text objects, ignoring {}", texts.len());
            return;
        }
        data.texts.extend(texts.into_iter().map(Some));
        data.texts.push(None);
    }

    /// Transform every path; text objects carry their own matrices.
    pub fn transform(&mut self, matrix: &Matrix) {
        if self.data.is_none() {
            return;
        }
        let data = self.make_mut();
        for (path, _) in data.paths.iter_mut() {
            path.transform(matrix);
        }
    }

    /// Bounding box of the clip region.
    ///
    /// Returns `None` when the clip path does not restrict anything.
    pub fn clip_box(&self) -> Option<Rect> {
        let data = self.data.as_ref()?;
        let mut rect: Option<Rect> = None;
        for (path, _) in &data.paths {
            let b = path.bounding_box();
            rect = Some(match rect {
                Some(r) => r.intersect(&b),
                None => b,
            });
        }
        let mut layer: Option<Rect> = None;
        for text in &data.texts {
            match text {
                Some(obj) => {
                    let b = obj.rect;
                    layer = Some(match layer {
                        Some(l) => l.union(&b),
                        None => b,
                    });
                },
                None => {
                    let l = layer.take().unwrap_or_default();
                    rect = Some(match rect {
                        Some(r) => r.intersect(&l),
                        None => l,
                    });
                },
            }
        }
        rect
    }
}
