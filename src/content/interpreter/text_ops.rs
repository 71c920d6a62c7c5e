//! Text state and text showing operators.

use super::ContentInterpreter;
use crate::content::graphics_state::TextRenderMode;
use crate::content::page_object::{PageObjectKind, TextObject, TextSpacing, layout_text};
use crate::document::Document;
use crate::geometry::{Matrix, Point};
use crate::object::Object;
use std::rc::Rc;

impl ContentInterpreter {
    pub(super) fn handle_begin_text(&mut self, _doc: &Document) {
        let state = self.states.current_mut();
        state.text_matrix = Matrix::identity();
        state.text_pos = Point::default();
        state.text_line_pos = Point::default();
    }

    pub(super) fn handle_end_text(&mut self, _doc: &Document) {
        if self.clip_texts.is_empty() {
            return;
        }
        let texts = std::mem::take(&mut self.clip_texts);
        let state = self.states.current_mut();
        if state.text.render_mode.is_clip() {
            state.clip.append_texts(texts);
        }
    }

    pub(super) fn handle_set_char_space(&mut self, _doc: &Document) {
        self.states.current_mut().text.char_space = self.operands.number(0);
    }

    pub(super) fn handle_set_word_space(&mut self, _doc: &Document) {
        self.states.current_mut().text.word_space = self.operands.number(0);
    }

    pub(super) fn handle_set_horz_scale(&mut self, _doc: &Document) {
        if self.operands.len() != 1 {
            return;
        }
        self.states.current_mut().text_horz_scale = self.operands.number(0) / 100.0;
    }

    pub(super) fn handle_set_text_leading(&mut self, _doc: &Document) {
        self.states.current_mut().text_leading = self.operands.number(0);
    }

    pub(super) fn handle_set_text_rise(&mut self, _doc: &Document) {
        self.states.current_mut().text_rise = self.operands.number(0);
    }

    pub(super) fn handle_set_text_render_mode(&mut self, _doc: &Document) {
        if let Some(mode) = TextRenderMode::from_int(self.operands.integer(0)) {
            self.states.current_mut().text.render_mode = mode;
        }
    }

    pub(super) fn handle_set_font(&mut self, doc: &Document) {
        let size = self.operands.number(0);
        let name = self.operands.string(1);
        let font = self.find_font(doc, &name);
        let text = &mut self.states.current_mut().text;
        text.font_size = size;
        text.font = Some(font);
    }

    pub(super) fn handle_move_text_point(&mut self, _doc: &Document) {
        let offset = self.operands.point(0);
        let state = self.states.current_mut();
        state.text_line_pos.x += offset.x;
        state.text_line_pos.y += offset.y;
        state.text_pos = state.text_line_pos;
    }

    pub(super) fn handle_move_text_point_set_leading(&mut self, doc: &Document) {
        self.states.current_mut().text_leading = -self.operands.number(0);
        self.handle_move_text_point(doc);
    }

    pub(super) fn handle_set_text_matrix(&mut self, _doc: &Document) {
        let matrix = self.operands.matrix();
        let state = self.states.current_mut();
        state.text_matrix = matrix;
        state.text_pos = Point::default();
        state.text_line_pos = Point::default();
    }

    pub(super) fn handle_move_to_next_line(&mut self, _doc: &Document) {
        let state = self.states.current_mut();
        state.text_line_pos.y -= state.text_leading;
        state.text_pos = state.text_line_pos;
    }

    pub(super) fn handle_show_text(&mut self, _doc: &Document) {
        let bytes = self.string_bytes(0);
        if !bytes.is_empty() {
            self.add_text_object(&[bytes], 0.0, &[]);
        }
    }

    pub(super) fn handle_next_line_show_text(&mut self, doc: &Document) {
        self.handle_move_to_next_line(doc);
        self.handle_show_text(doc);
    }

    pub(super) fn handle_next_line_show_text_spacing(&mut self, doc: &Document) {
        let word_space = self.operands.number(2);
        let char_space = self.operands.number(1);
        let text = &mut self.states.current_mut().text;
        text.word_space = word_space;
        text.char_space = char_space;
        self.handle_next_line_show_text(doc);
    }

    pub(super) fn handle_show_text_positioning(&mut self, doc: &Document) {
        let Some(Object::Array(items)) = self.operands.object(0).cloned() else {
            return;
        };
        let items: Vec<&Object> = items.iter().map(|o| doc.resolve(o)).collect();
        let string_count = items.iter().filter(|o| matches!(o, Object::String(_))).count();

        if string_count == 0 {
            let state = self.states.current_mut();
            let scale = state.text.font_size / 1000.0 * state.text_horz_scale;
            for number in items.iter().filter_map(|o| o.as_number()) {
                state.text_pos.x -= number * scale;
            }
            return;
        }

        let mut segments: Vec<Vec<u8>> = Vec::with_capacity(string_count);
        let mut kernings = vec![0.0f32; string_count];
        let mut init_kerning = 0.0;
        for item in items {
            match item {
                Object::String(bytes) => {
                    if !bytes.is_empty() {
                        segments.push(bytes.clone());
                    }
                },
                other => {
                    if let Some(number) = other.as_number() {
                        match segments.len() {
                            0 => init_kerning += number,
                            n => kernings[n - 1] += number,
                        }
                    }
                },
            }
        }
        kernings.truncate(segments.len());
        self.add_text_object(&segments, init_kerning, &kernings);
    }

    /// Shift the text position by a kerning amount in thousandths of text
    /// space.
    fn apply_kerning(&mut self, kerning: f32, vertical: bool) {
        if kerning == 0.0 {
            return;
        }
        let state = self.states.current_mut();
        let shift = kerning * state.text.font_size / 1000.0;
        if vertical {
            state.text_pos.y -= shift;
        } else {
            state.text_pos.x -= shift * state.text_horz_scale;
        }
    }

    /// Emit a text object for `segments`, separated by `kernings`.
    ///
    /// The kerning after the last segment only moves the text position.
    fn add_text_object(&mut self, segments: &[Vec<u8>], init_kerning: f32, kernings: &[f32]) {
        let Some(font) = self.states.current().text.font.clone() else {
            return;
        };
        let vertical = font.is_vert_writing();
        self.apply_kerning(init_kerning, vertical);
        if segments.is_empty() {
            return;
        }

        let state = self.states.current();
        let mode = if font.as_type3().is_some() {
            TextRenderMode::Fill
        } else {
            state.text.render_mode
        };
        let codes: Vec<Vec<u32>> = segments.iter().map(|s| font.split_codes(s)).collect();
        let spacing = TextSpacing {
            font_size: state.text.font_size,
            char_space: state.text.char_space,
            word_space: state.text.word_space,
            horz_scale: state.text_horz_scale,
        };
        let layout = layout_text(font.as_ref(), &codes, kernings, spacing);

        let ctm = state.ctm;
        let text_to_user = Matrix::scaling(state.text_horz_scale, 1.0)
            .multiply(&state.text_matrix)
            .multiply(&ctm)
            .multiply(&self.content_to_user);
        let origin = state
            .text_matrix
            .transform_point(state.text_pos.x, state.text_pos.y + state.text_rise);
        let origin = self.content_to_user.transform(ctm.transform(origin));
        let matrix = Matrix::new(
            text_to_user.a,
            text_to_user.b,
            text_to_user.c,
            text_to_user.d,
            origin.x,
            origin.y,
        );
        let line_width = state.graph.line_width;

        let kind = PageObjectKind::Text(TextObject {
            items: layout.items,
            matrix,
        });
        let mut obj = self.new_object(kind, true, true, true);
        obj.text.render_mode = mode;
        if mode.is_stroke() {
            obj.text.ctm = Matrix::new(ctm.a, ctm.b, ctm.c, ctm.d, 0.0, 0.0);
        }
        obj.original_rect = layout.bbox;
        obj.rect = matrix.transform_rect(&layout.bbox);
        if mode.is_stroke() {
            obj.rect.inflate(line_width / 2.0, line_width / 2.0);
        }

        let state = self.states.current_mut();
        state.text_pos.x += layout.advance.x;
        state.text_pos.y += layout.advance.y;

        let obj = Rc::new(obj);
        if mode.is_clip() {
            self.clip_texts.push(Rc::new(obj.clone_object()));
        }
        self.append_object(obj);

        if let Some(&last) = kernings.get(segments.len() - 1) {
            self.apply_kerning(last, vertical);
        }
    }
}
