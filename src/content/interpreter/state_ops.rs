//! Graphics state, color, marked-content and Type 3 metric operators.

use super::ContentInterpreter;
use crate::content::color::ColorSpaceFamily;
use crate::content::path::{LineCap, LineJoin};
use crate::document::Document;
use crate::geometry::Rect;
use crate::object::Object;

impl ContentInterpreter {
    pub(super) fn handle_save_graph_state(&mut self, _doc: &Document) {
        self.states.save();
    }

    pub(super) fn handle_restore_graph_state(&mut self, _doc: &Document) {
        if !self.states.restore() {
            log::debug!("Unbalanced Q ignored");
        }
    }

    pub(super) fn handle_concat_matrix(&mut self, _doc: &Document) {
        let matrix = self.operands.matrix();
        let state = self.states.current_mut();
        state.ctm = matrix.multiply(&state.ctm);
        let ctm = state.ctm;
        if let Some(index) = self.current_stream_index() {
            self.stream_ctms.insert(index, ctm);
        }
    }

    pub(super) fn handle_set_line_width(&mut self, _doc: &Document) {
        self.states.current_mut().graph.line_width = self.operands.number(0);
    }

    pub(super) fn handle_set_line_cap(&mut self, _doc: &Document) {
        self.states.current_mut().graph.line_cap = LineCap::from_int(self.operands.integer(0));
    }

    pub(super) fn handle_set_line_join(&mut self, _doc: &Document) {
        self.states.current_mut().graph.line_join = LineJoin::from_int(self.operands.integer(0));
    }

    pub(super) fn handle_set_miter_limit(&mut self, _doc: &Document) {
        self.states.current_mut().graph.miter_limit = self.operands.number(0);
    }

    pub(super) fn handle_set_dash(&mut self, doc: &Document) {
        let phase = self.operands.number(0);
        let Some(Object::Array(array)) = self.operands.object(1).map(|o| doc.resolve(o).clone()) else {
            return;
        };
        self.states.current_mut().set_line_dash(doc, &array, phase, 1.0);
    }

    pub(super) fn handle_set_rendering_intent(&mut self, _doc: &Document) {
        self.states.current_mut().general.rendering_intent = self.operands.string(0);
    }

    pub(super) fn handle_set_flat(&mut self, _doc: &Document) {
        self.states.current_mut().general.flatness = self.operands.number(0);
    }

    pub(super) fn handle_set_ext_graph_state(&mut self, doc: &Document) {
        let name = self.operands.string(0);
        let dict = self
            .find_resource(doc, "ExtGState", &name)
            .and_then(|obj| doc.resolve(&obj).as_dict().cloned());
        match dict {
            Some(dict) => self.states.current_mut().process_ext_gstate(doc, &dict),
            None => {
                log::debug!("ExtGState {} not found", name);
                self.resource_missing = true;
            },
        }
    }

    pub(super) fn handle_set_fill_color_space(&mut self, doc: &Document) {
        let name = self.operands.string(0);
        if let Some(space) = self.find_color_space(doc, &name) {
            self.states.current_mut().color.set_fill_color_space(space);
        }
    }

    pub(super) fn handle_set_stroke_color_space(&mut self, doc: &Document) {
        let name = self.operands.string(0);
        if let Some(space) = self.find_color_space(doc, &name) {
            self.states.current_mut().color.set_stroke_color_space(space);
        }
    }

    pub(super) fn handle_set_fill_color(&mut self, _doc: &Document) {
        let values = self.operands.numbers(self.operands.len().min(4));
        self.states.current_mut().color.set_fill_values(&values);
    }

    pub(super) fn handle_set_stroke_color(&mut self, _doc: &Document) {
        let values = self.operands.numbers(self.operands.len().min(4));
        self.states.current_mut().color.set_stroke_values(&values);
    }

    pub(super) fn handle_set_fill_color_pattern(&mut self, doc: &Document) {
        self.set_color_with_pattern(doc, true);
    }

    pub(super) fn handle_set_stroke_color_pattern(&mut self, doc: &Document) {
        self.set_color_with_pattern(doc, false);
    }

    /// `scn`/`SCN`: numbers only, or numbers followed by a pattern name.
    fn set_color_with_pattern(&mut self, doc: &Document, fill: bool) {
        let count = self.operands.len();
        let Some(last) = self.operands.object(0) else {
            return;
        };
        let Some(name) = last.as_name().map(str::to_string) else {
            let values = self.operands.numbers(count);
            let color = &mut self.states.current_mut().color;
            if fill {
                color.set_fill_values(&values);
            } else {
                color.set_stroke_values(&values);
            }
            return;
        };
        let Some(pattern) = self.find_pattern(doc, &name) else {
            return;
        };
        // Numbers before the name tint uncolored patterns
        let values: Vec<f32> = (1..count).rev().map(|i| self.operands.number(i)).collect();
        let state = self.states.current_mut();
        let pattern = pattern.with_parent_matrix(&state.parent_matrix);
        if fill {
            state.color.set_fill_pattern(pattern, &values);
        } else {
            state.color.set_stroke_pattern(pattern, &values);
        }
    }

    pub(super) fn handle_set_fill_gray(&mut self, _doc: &Document) {
        let values = [self.operands.number(0)];
        self.states.current_mut().color.set_fill_device(ColorSpaceFamily::DeviceGray, &values);
    }

    pub(super) fn handle_set_stroke_gray(&mut self, _doc: &Document) {
        let values = [self.operands.number(0)];
        self.states.current_mut().color.set_stroke_device(ColorSpaceFamily::DeviceGray, &values);
    }

    pub(super) fn handle_set_fill_rgb(&mut self, _doc: &Document) {
        if self.operands.len() != 3 {
            return;
        }
        let values = self.operands.numbers(3);
        self.states.current_mut().color.set_fill_device(ColorSpaceFamily::DeviceRgb, &values);
    }

    pub(super) fn handle_set_stroke_rgb(&mut self, _doc: &Document) {
        if self.operands.len() != 3 {
            return;
        }
        let values = self.operands.numbers(3);
        self.states.current_mut().color.set_stroke_device(ColorSpaceFamily::DeviceRgb, &values);
    }

    pub(super) fn handle_set_fill_cmyk(&mut self, _doc: &Document) {
        if self.operands.len() != 4 {
            return;
        }
        let values = self.operands.numbers(4);
        self.states.current_mut().color.set_fill_device(ColorSpaceFamily::DeviceCmyk, &values);
    }

    pub(super) fn handle_set_stroke_cmyk(&mut self, _doc: &Document) {
        if self.operands.len() != 4 {
            return;
        }
        let values = self.operands.numbers(4);
        self.states.current_mut().color.set_stroke_device(ColorSpaceFamily::DeviceCmyk, &values);
    }

    pub(super) fn handle_begin_marked_content(&mut self, _doc: &Document) {
        let mut marks = self.current_marks().clone();
        marks.add_mark(self.operands.string(0));
        self.marks.push(marks);
    }

    pub(super) fn handle_begin_marked_content_dict(&mut self, doc: &Document) {
        let tag = self.operands.string(1);
        let Some(property) = self.operands.object(0).cloned() else {
            return;
        };
        let mut marks = self.current_marks().clone();
        match property {
            Object::Name(name) => {
                let Some((object, dict)) = self.find_resource_holder(doc, "Properties", &name) else {
                    log::debug!("Marked-content properties {} not found", name);
                    return;
                };
                marks.add_mark_with_properties_resource(tag, name, object, dict);
            },
            Object::Dictionary(dict) => marks.add_mark_with_direct_dict(tag, dict),
            _ => return,
        }
        self.marks.push(marks);
    }

    pub(super) fn handle_end_marked_content(&mut self, _doc: &Document) {
        if self.marks.len() > 1 {
            self.marks.pop();
        }
    }

    pub(super) fn handle_set_char_width(&mut self, _doc: &Document) {
        let width = self.operands.number(1);
        let height = self.operands.number(0);
        if let Some(metrics) = self.type3.as_mut() {
            metrics.width = width;
            metrics.height = height;
            metrics.colored = true;
        }
    }

    pub(super) fn handle_set_cached_device(&mut self, _doc: &Document) {
        let v = self.operands.numbers(6);
        let Some(metrics) = self.type3.as_mut() else {
            return;
        };
        if v.len() < 6 {
            return;
        }
        metrics.width = v[0];
        metrics.height = v[1];
        metrics.bbox = Some(Rect::from_points(v[2], v[3], v[4], v[5]));
        metrics.colored = false;
    }
}
