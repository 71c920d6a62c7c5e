//! Path construction (`m l c v y h re`), clipping (`W W*`) and painting.

use super::ContentInterpreter;
use crate::content::page_object::{PageObjectKind, PathObject};
use crate::content::path::{FillType, LineCap, Path, PathPoint, PointKind};
use crate::content::stream_reader::{ElementType, StreamReader};
use crate::document::Document;
use crate::geometry::Point;
use std::rc::Rc;

impl ContentInterpreter {
    pub(super) fn handle_move_to(&mut self, _doc: &Document) {
        if self.operands.len() != 2 {
            return;
        }
        self.add_path_point(self.operands.point(0), PointKind::Move);
    }

    pub(super) fn handle_line_to(&mut self, _doc: &Document) {
        if self.operands.len() != 2 {
            return;
        }
        self.add_path_point(self.operands.point(0), PointKind::Line);
    }

    pub(super) fn handle_curve_to_123(&mut self, _doc: &Document) {
        self.add_path_point(self.operands.point(4), PointKind::Bezier);
        self.add_path_point(self.operands.point(2), PointKind::Bezier);
        self.add_path_point(self.operands.point(0), PointKind::Bezier);
    }

    pub(super) fn handle_curve_to_23(&mut self, _doc: &Document) {
        self.add_path_point(self.path_current, PointKind::Bezier);
        self.add_path_point(self.operands.point(2), PointKind::Bezier);
        self.add_path_point(self.operands.point(0), PointKind::Bezier);
    }

    pub(super) fn handle_curve_to_13(&mut self, _doc: &Document) {
        self.add_path_point(self.operands.point(2), PointKind::Bezier);
        self.add_path_point(self.operands.point(0), PointKind::Bezier);
        self.add_path_point(self.operands.point(0), PointKind::Bezier);
    }

    pub(super) fn handle_close_path(&mut self, _doc: &Document) {
        self.close_path();
    }

    pub(super) fn handle_rectangle(&mut self, _doc: &Document) {
        let x = self.operands.number(3);
        let y = self.operands.number(2);
        let w = self.operands.number(1);
        let h = self.operands.number(0);
        self.add_path_rect(x, y, w, h);
    }

    pub(super) fn handle_clip(&mut self, _doc: &Document) {
        self.pending_clip = FillType::Winding;
    }

    pub(super) fn handle_eo_clip(&mut self, _doc: &Document) {
        self.pending_clip = FillType::EvenOdd;
    }

    pub(super) fn handle_fill_path(&mut self, _doc: &Document) {
        self.add_path_object(FillType::Winding, false);
    }

    pub(super) fn handle_eo_fill_path(&mut self, _doc: &Document) {
        self.add_path_object(FillType::EvenOdd, false);
    }

    pub(super) fn handle_stroke_path(&mut self, _doc: &Document) {
        self.add_path_object(FillType::NoFill, true);
    }

    pub(super) fn handle_close_stroke_path(&mut self, _doc: &Document) {
        self.close_path();
        self.add_path_object(FillType::NoFill, true);
    }

    pub(super) fn handle_fill_stroke_path(&mut self, _doc: &Document) {
        self.add_path_object(FillType::Winding, true);
    }

    pub(super) fn handle_eo_fill_stroke_path(&mut self, _doc: &Document) {
        self.add_path_object(FillType::EvenOdd, true);
    }

    pub(super) fn handle_close_fill_stroke_path(&mut self, _doc: &Document) {
        self.close_path();
        self.add_path_object(FillType::Winding, true);
    }

    pub(super) fn handle_close_eo_fill_stroke_path(&mut self, _doc: &Document) {
        self.add_path_point_and_close(self.path_start, PointKind::Line);
        self.add_path_object(FillType::EvenOdd, true);
    }

    pub(super) fn handle_end_path(&mut self, _doc: &Document) {
        self.add_path_object(FillType::NoFill, false);
    }

    /// Consume the path operators that usually follow an `m` without going
    /// through the operand stack and the dispatch table.
    ///
    /// Stops before the first token that is not a number or a path
    /// construction operator.
    pub(super) fn parse_path_fast(&mut self, reader: &mut StreamReader<'_>) {
        let mut params = [0.0f32; 6];
        let mut count = 0;
        let mut last_pos = reader.position();
        loop {
            let processed = match reader.parse_next_element() {
                ElementType::EndOfData => return,
                ElementType::Keyword => {
                    let p = |i: usize, j: usize| Point::new(params[i], params[j]);
                    let processed = match reader.word() {
                        b"m" => {
                            self.add_path_point(p(0, 1), PointKind::Move);
                            true
                        },
                        b"l" => {
                            self.add_path_point(p(0, 1), PointKind::Line);
                            true
                        },
                        b"c" => {
                            self.add_path_point(p(0, 1), PointKind::Bezier);
                            self.add_path_point(p(2, 3), PointKind::Bezier);
                            self.add_path_point(p(4, 5), PointKind::Bezier);
                            true
                        },
                        b"v" => {
                            self.add_path_point(self.path_current, PointKind::Bezier);
                            self.add_path_point(p(0, 1), PointKind::Bezier);
                            self.add_path_point(p(2, 3), PointKind::Bezier);
                            true
                        },
                        b"y" => {
                            self.add_path_point(p(0, 1), PointKind::Bezier);
                            self.add_path_point(p(2, 3), PointKind::Bezier);
                            self.add_path_point(p(2, 3), PointKind::Bezier);
                            true
                        },
                        b"h" => {
                            self.close_path();
                            true
                        },
                        b"re" => {
                            self.add_path_rect(params[0], params[1], params[2], params[3]);
                            true
                        },
                        _ => false,
                    };
                    if processed {
                        count = 0;
                        last_pos = reader.position();
                    }
                    processed
                },
                ElementType::Number => {
                    if count < params.len() {
                        params[count] = reader.number();
                        count += 1;
                    }
                    true
                },
                _ => false,
            };
            if !processed {
                reader.set_position(last_pos);
                return;
            }
        }
    }

    fn add_path_point(&mut self, point: Point, kind: PointKind) {
        if kind == PointKind::Move {
            if let Some(last) = self.path_points.last() {
                // A repeated move to the current point is a no-op
                if !last.close && last.kind == PointKind::Move && self.path_current == point {
                    return;
                }
            }
        }
        self.path_current = point;
        if kind == PointKind::Move {
            self.path_start = point;
            if let Some(last) = self.path_points.last_mut() {
                if last.kind == PointKind::Move && !last.close {
                    last.point = point;
                    return;
                }
            }
        } else if self.path_points.is_empty() {
            return;
        }
        self.path_points.push(PathPoint::new(point, kind));
    }

    fn add_path_point_and_close(&mut self, point: Point, kind: PointKind) {
        self.path_current = point;
        if self.path_points.is_empty() {
            return;
        }
        self.path_points.push(PathPoint {
            point,
            kind,
            close: true,
        });
    }

    fn add_path_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.add_path_point(Point::new(x, y), PointKind::Move);
        self.add_path_point(Point::new(x + w, y), PointKind::Line);
        self.add_path_point(Point::new(x + w, y + h), PointKind::Line);
        self.add_path_point(Point::new(x, y + h), PointKind::Line);
        self.add_path_point_and_close(Point::new(x, y), PointKind::Line);
    }

    fn close_path(&mut self) {
        if self.path_points.is_empty() {
            return;
        }
        if self.path_start != self.path_current {
            self.add_path_point_and_close(self.path_start, PointKind::Line);
        } else if let Some(last) = self.path_points.last_mut() {
            last.close = true;
        }
    }

    /// Turn the pending path into a path object and/or a clip.
    fn add_path_object(&mut self, fill_type: FillType, stroke: bool) {
        let mut points = std::mem::take(&mut self.path_points);
        let clip_type = std::mem::replace(&mut self.pending_clip, FillType::NoFill);
        if points.is_empty() {
            return;
        }
        if points.len() == 1 {
            if clip_type != FillType::NoFill {
                let mut empty = Path::new();
                empty.append_rect(0.0, 0.0, 0.0, 0.0);
                self.states.current_mut().clip.append_path(empty, FillType::Winding, true);
                return;
            }
            // A closed lone move paints a dot, but only with round caps
            let point = &mut points[0];
            if point.kind != PointKind::Move
                || !point.close
                || self.states.current().graph.line_cap != LineCap::Round
            {
                return;
            }
            point.close = false;
            let dot = PathPoint {
                point: point.point,
                kind: PointKind::Line,
                close: true,
            };
            points.push(dot);
        }
        if points.last().is_some_and(|p| p.kind == PointKind::Move && !p.close) {
            points.pop();
        }

        let mut path = Path::new();
        for point in points {
            path.append_path_point(point);
        }
        let matrix = self.object_matrix();
        if fill_type != FillType::NoFill || stroke {
            let kind = PageObjectKind::Path(PathObject {
                path: path.clone(),
                fill_type,
                stroke,
                matrix,
            });
            let mut obj = self.new_object(kind, true, false, true);
            if let Some((original, rect)) = obj.as_path().map(|p| p.calc_bounding_box(&obj.graph)) {
                obj.original_rect = original;
                obj.rect = rect;
            }
            self.append_object(Rc::new(obj));
        }
        if clip_type != FillType::NoFill {
            if !matrix.is_identity() {
                path.transform(&matrix);
            }
            self.states.current_mut().clip.append_path(path, clip_type, true);
        }
    }
}
