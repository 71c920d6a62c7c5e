//! Form XObjects and Type 3 glyph procedures.

use crate::content::graphics_state::AllStates;
use crate::content::interpreter::{ContentInterpreter, Type3Metrics};
use crate::content::page_object::{PageObjectHolder, ParseState, Transparency};
use crate::content::path::{FillType, Path};
use crate::document::Document;
use crate::geometry::{Matrix, Rect};
use crate::object::{Dict, Object, ObjectRef};
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Identity of a content stream, used to detect forms that draw themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// An indirect stream object
    Object(ObjectRef),
    /// A direct stream, identified by a hash of its dictionary keys and data
    Direct(u64),
}

impl StreamId {
    /// Identify the stream `obj` (a reference or a direct stream).
    pub fn for_object(doc: &Document, obj: &Object) -> Self {
        if let Some(r) = obj.as_reference() {
            return StreamId::Object(r);
        }
        let mut hasher = DefaultHasher::new();
        if let Some((dict, data)) = doc.resolve(obj).as_stream() {
            for key in dict.keys() {
                key.hash(&mut hasher);
            }
            data.hash(&mut hasher);
        }
        StreamId::Direct(hasher.finish())
    }
}

/// Forms currently being parsed, shared by nested parses.
#[derive(Debug, Clone, Default)]
pub struct RecursionState {
    visited: HashSet<StreamId>,
    depth: usize,
}

impl RecursionState {
    /// A state with nothing visited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start parsing `id`.
    ///
    /// Fails when `id` is already being parsed further up or the nesting
    /// is deeper than `max_level`.
    pub fn enter(&mut self, id: &StreamId, max_level: usize) -> bool {
        if self.visited.len() > max_level || self.depth > max_level || self.visited.contains(id) {
            return false;
        }
        self.visited.insert(id.clone());
        self.depth += 1;
        true
    }

    /// Finish parsing `id`.
    pub fn leave(&mut self, id: &StreamId) {
        if self.visited.remove(id) {
            self.depth = self.depth.saturating_sub(1);
        }
    }

    /// Number of forms being parsed.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True while `id` is being parsed.
    pub fn contains(&self, id: &StreamId) -> bool {
        self.visited.contains(id)
    }
}

/// A parsed form XObject.
#[derive(Debug)]
pub struct Form {
    stream: Object,
    stream_id: StreamId,
    resources: Dict,
    page_resources: Dict,
    matrix: Matrix,
    holder: PageObjectHolder,
}

impl Form {
    /// Prepare the form stored in `stream`.
    ///
    /// Resources come from the form itself, then `parent_resources`, then
    /// the page.
    pub fn new(doc: &Document, stream: &Object, parent_resources: Option<&Dict>, page_resources: &Dict) -> Option<Self> {
        let stream_id = StreamId::for_object(doc, stream);
        let resolved = doc.resolve(stream);
        let (dict, _) = resolved.as_stream()?;

        let resources = doc
            .dict_get_dict(dict, "Resources")
            .or(parent_resources)
            .unwrap_or(page_resources)
            .clone();
        let matrix = doc
            .number_array(doc.dict_get(dict, "Matrix"))
            .filter(|v| v.len() == 6)
            .map_or_else(Matrix::identity, |v| Matrix::from_array(&v));
        let bbox = doc
            .number_array(doc.dict_get(dict, "BBox"))
            .and_then(|v| Rect::from_array(&v));

        let holder = PageObjectHolder {
            bbox: bbox.unwrap_or_default(),
            transparency: Transparency::from_dict(doc, dict),
            ..PageObjectHolder::default()
        };
        Some(Self {
            stream: resolved.clone(),
            stream_id,
            resources,
            page_resources: page_resources.clone(),
            matrix,
            holder,
        })
    }

    /// The form's stream dictionary.
    pub fn dict(&self) -> Option<&Dict> {
        self.stream.as_stream().map(|(d, _)| d)
    }

    /// The `/Matrix` entry.
    pub fn matrix(&self) -> Matrix {
        self.matrix
    }

    /// Resources used by the form's content.
    pub fn resources(&self) -> &Dict {
        &self.resources
    }

    /// The parsed objects.
    pub fn holder(&self) -> &PageObjectHolder {
        &self.holder
    }

    /// Transparency group attributes.
    pub fn transparency(&self) -> Transparency {
        self.holder.transparency
    }

    /// Parse the form content.
    ///
    /// `parent_states` seeds the graphics state (its CTM is concatenated to
    /// `/Matrix`); `parent_matrix` maps the parent's user space to the
    /// page. A form already on the `recursion` path is left empty.
    pub fn parse(
        &mut self,
        doc: &Document,
        parent_states: Option<&AllStates>,
        parent_matrix: Option<&Matrix>,
        recursion: &mut RecursionState,
    ) {
        self.parse_internal(doc, parent_states, parent_matrix, recursion, false);
    }

    /// Parse a Type 3 glyph procedure and return its `d0`/`d1` metrics.
    pub fn parse_type3(&mut self, doc: &Document) -> Type3Metrics {
        let mut recursion = RecursionState::new();
        self.parse_internal(doc, None, None, &mut recursion, true)
            .unwrap_or_default()
    }

    fn parse_internal(
        &mut self,
        doc: &Document,
        parent_states: Option<&AllStates>,
        parent_matrix: Option<&Matrix>,
        recursion: &mut RecursionState,
        type3: bool,
    ) -> Option<Type3Metrics> {
        if self.holder.parse_state != ParseState::NotParsed {
            return None;
        }
        self.holder.parse_state = ParseState::Parsing;
        if !recursion.enter(&self.stream_id, doc.limits().max_form_level) {
            log::debug!("Skipping recursive form {:?}", self.stream_id);
            self.holder.parse_state = ParseState::Parsed;
            return None;
        }

        let data = match doc.decode_stream(&self.stream) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Failed to decode form content: {}", e);
                recursion.leave(&self.stream_id);
                self.holder.parse_state = ParseState::Parsed;
                return None;
            },
        };

        let mut form_matrix = self.matrix;
        if let Some(states) = parent_states {
            form_matrix.concat(&states.ctm);
        }
        let mut bbox = self.holder.bbox;
        let mut clip = Path::new();
        if !bbox.is_empty() {
            clip.append_rect(bbox.left, bbox.bottom, bbox.right, bbox.top);
            clip.transform(&form_matrix);
            bbox = form_matrix.transform_rect(&bbox);
            if let Some(parent) = parent_matrix {
                clip.transform(parent);
                bbox = parent.transform_rect(&bbox);
            }
        }

        let mut states = match parent_states {
            Some(parent) => parent.clone(),
            None => AllStates::new(),
        };
        states.ctm = form_matrix;
        states.parent_matrix = form_matrix;
        if !clip.is_empty() {
            states.clip.append_path(clip, FillType::Winding, true);
        }
        if self.holder.transparency.group {
            states.general.reset_transparency();
        }

        let mut interpreter = ContentInterpreter::new(
            doc,
            self.resources.clone(),
            self.page_resources.clone(),
            bbox,
            states,
            std::mem::take(recursion),
        );
        if let Some(parent) = parent_matrix {
            interpreter.set_content_to_user(*parent);
        }
        if type3 {
            interpreter.enable_type3_metrics();
        }
        interpreter.parse(doc, &data, 0, 0, &[]);

        let output = interpreter.finish();
        *recursion = output.recursion;
        recursion.leave(&self.stream_id);

        self.holder.objects = output.objects;
        self.holder.stream_ctms = output.stream_ctms;
        self.holder.image_mask_boxes = output.image_mask_boxes;
        self.holder.background_alpha_needed |= output.background_alpha_needed;
        self.holder.parse_state = ParseState::Parsed;
        output.type3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_stream(content: &[u8], matrix: Option<[f32; 6]>) -> Object {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
        dict.insert(
            "BBox".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(100),
                Object::Integer(100),
            ]),
        );
        if let Some(m) = matrix {
            dict.insert("Matrix".to_string(), Object::Array(m.iter().map(|v| Object::Real(*v as f64)).collect()));
        }
        Object::Stream {
            dict,
            data: bytes::Bytes::copy_from_slice(content),
        }
    }

    #[test]
    fn test_recursion_state() {
        let mut state = RecursionState::new();
        let a = StreamId::Object(ObjectRef::new(1, 0));
        let b = StreamId::Object(ObjectRef::new(2, 0));
        assert!(state.enter(&a, 40));
        assert!(!state.enter(&a, 40));
        assert!(state.enter(&b, 40));
        assert_eq!(state.depth(), 2);
        state.leave(&b);
        state.leave(&a);
        assert_eq!(state.depth(), 0);
        assert!(state.enter(&a, 40));
    }

    #[test]
    fn test_recursion_state_level_limit() {
        let mut state = RecursionState::new();
        for i in 0..3 {
            assert!(state.enter(&StreamId::Direct(i), 2));
        }
        assert!(!state.enter(&StreamId::Direct(99), 2));
    }

    #[test]
    fn test_form_parse_applies_matrix_and_clip() {
        let doc = Document::new();
        let stream = form_stream(b"0 0 10 10 re f", Some([2.0, 0.0, 0.0, 2.0, 5.0, 5.0]));
        let mut form = Form::new(&doc, &stream, None, &Dict::new()).expect("form");
        let mut recursion = RecursionState::new();
        form.parse(&doc, None, None, &mut recursion);

        let holder = form.holder();
        assert!(holder.is_parsed());
        assert_eq!(holder.len(), 1);
        let obj = &holder.objects[0];
        assert_eq!(obj.rect, Rect::new(5.0, 5.0, 25.0, 25.0));
        assert_eq!(obj.clip.clip_box(), Some(Rect::new(5.0, 5.0, 205.0, 205.0)));
        assert_eq!(recursion.depth(), 0);
    }

    #[test]
    fn test_type3_metrics() {
        let doc = Document::new();
        let stream = form_stream(b"750 0 0 0 700 700 d1 0 0 700 700 re f", None);
        let mut form = Form::new(&doc, &stream, None, &Dict::new()).expect("form");
        let metrics = form.parse_type3(&doc);
        assert_eq!(metrics.width, 750.0);
        assert!(!metrics.colored);
        assert_eq!(metrics.bbox, Some(Rect::new(0.0, 0.0, 700.0, 700.0)));
        assert_eq!(form.holder().len(), 1);
    }
}
