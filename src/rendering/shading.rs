//! Shading rasterization.
//!
//! Every function here paints into a bitmap whose pixels map back to
//! shading space through the inverse of `matrix`. Axial and radial
//! shadings look colors up in a 256-step table spanning the domain;
//! function-based shadings evaluate per pixel; meshes are split into
//! triangles and filled with interpolated colors.

use crate::content::mesh::{patches, triangles, MeshVertex};
use crate::content::pattern::{Shading, ShadingType};
use crate::geometry::{Matrix, Point};
use tiny_skia::{ColorU8, Pixmap};

const SHADING_STEPS: usize = 256;

/// Upper bound of the subdivision grid of one patch.
const MAX_PATCH_GRID: usize = 64;

/// Paint `shading` into `pixmap`, `matrix` mapping shading space to its
/// pixels. Colors are scaled by `alpha`.
pub(crate) fn rasterize(pixmap: &mut Pixmap, shading: &Shading, matrix: &Matrix, alpha: f32) {
    match shading.shading_type {
        ShadingType::Function => draw_function(pixmap, shading, matrix, alpha),
        ShadingType::Axial => draw_axial(pixmap, shading, matrix, alpha),
        ShadingType::Radial => draw_radial(pixmap, shading, matrix, alpha),
        ShadingType::FreeFormTriangles | ShadingType::LatticeTriangles => {
            for triangle in triangles(shading) {
                let points = triangle.each_ref().map(|v| matrix.transform(v.point));
                fill_triangle(pixmap, shading, &points, &triangle, alpha);
            }
        },
        ShadingType::CoonsPatches | ShadingType::TensorPatches => draw_patches(pixmap, shading, matrix, alpha),
    }
}

/// Fill the whole bitmap with the shading's `/Background`.
pub(crate) fn fill_background(pixmap: &mut Pixmap, shading: &Shading, alpha: f32) {
    if let Some(rgb) = shading.background_rgb() {
        let [r, g, b] = rgb.to_bytes();
        let color = ColorU8::from_rgba(r, g, b, alpha_byte(alpha)).premultiply();
        pixmap.pixels_mut().fill(color);
    }
}

fn alpha_byte(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn put(pixmap: &mut Pixmap, x: u32, y: u32, rgb: [u8; 3], alpha: u8) {
    let width = pixmap.width();
    if let Some(px) = pixmap.pixels_mut().get_mut((y * width + x) as usize) {
        *px = ColorU8::from_rgba(rgb[0], rgb[1], rgb[2], alpha).premultiply();
    }
}

/// Colors at `SHADING_STEPS` evenly spaced parameters of the domain.
fn color_table(shading: &Shading) -> Vec<Option<[u8; 3]>> {
    let t0 = shading.domain.first().copied().unwrap_or(0.0);
    let t1 = shading.domain.get(1).copied().unwrap_or(1.0);
    (0..SHADING_STEPS)
        .map(|i| {
            let t = t0 + (t1 - t0) * i as f32 / SHADING_STEPS as f32;
            shading.color_at(&[t]).map(|c| c.to_bytes())
        })
        .collect()
}

/// Table index for a parameter, honoring `/Extend`.
fn step_index(s: f32, extend: [bool; 2]) -> Option<usize> {
    let index = (s * (SHADING_STEPS - 1) as f32) as i32;
    if index < 0 {
        return extend[0].then_some(0);
    }
    if index >= SHADING_STEPS as i32 {
        return extend[1].then_some(SHADING_STEPS - 1);
    }
    Some(index as usize)
}

fn draw_axial(pixmap: &mut Pixmap, shading: &Shading, matrix: &Matrix, alpha: f32) {
    let [x0, y0, x1, y1] = match shading.coords[..] {
        [x0, y0, x1, y1, ..] => [x0, y0, x1, y1],
        _ => return,
    };
    let table = color_table(shading);
    let a = alpha_byte(alpha);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let len2 = dx * dx + dy * dy;
    let inverse = matrix.inverse();
    for row in 0..pixmap.height() {
        for col in 0..pixmap.width() {
            let p = inverse.transform_point(col as f32 + 0.5, row as f32 + 0.5);
            let s = if len2 == 0.0 {
                0.0
            } else {
                ((p.x - x0) * dx + (p.y - y0) * dy) / len2
            };
            let Some(index) = step_index(s, shading.extend) else {
                continue;
            };
            if let Some(rgb) = table[index] {
                put(pixmap, col, row, rgb, a);
            }
        }
    }
}

fn draw_radial(pixmap: &mut Pixmap, shading: &Shading, matrix: &Matrix, alpha: f32) {
    let [x0, y0, r0, x1, y1, r1] = match shading.coords[..] {
        [x0, y0, r0, x1, y1, r1, ..] => [x0, y0, r0, x1, y1, r1],
        _ => return,
    };
    let table = color_table(shading);
    let alpha = alpha_byte(alpha);
    let (dx, dy, dr) = (x1 - x0, y1 - y0, r1 - r0);
    let a = dx * dx + dy * dy - dr * dr;
    let decreasing = r0 > r1 && (dx * dx + dy * dy).sqrt() < r0 - r1;
    let [extend_start, extend_end] = shading.extend;
    let inverse = matrix.inverse();
    for row in 0..pixmap.height() {
        for col in 0..pixmap.width() {
            let p = inverse.transform_point(col as f32 + 0.5, row as f32 + 0.5);
            let (pdx, pdy) = (p.x - x0, p.y - y0);
            let b = -2.0 * (pdx * dx + pdy * dy + r0 * dr);
            let c = pdx * pdx + pdy * pdy - r0 * r0;
            let s = if a == 0.0 {
                if b == 0.0 {
                    continue;
                }
                -c / b
            } else {
                let discriminant = b * b - 4.0 * a * c;
                if discriminant < 0.0 {
                    continue;
                }
                let root = discriminant.sqrt();
                let (s1, s2) = if a > 0.0 {
                    ((-b - root) / (2.0 * a), (-b + root) / (2.0 * a))
                } else {
                    ((-b + root) / (2.0 * a), (-b - root) / (2.0 * a))
                };
                if decreasing {
                    if s1 >= 0.0 || extend_start {
                        s1
                    } else {
                        s2
                    }
                } else if s2 <= 1.0 || extend_end {
                    s2
                } else {
                    s1
                }
            };
            if r0 + s * dr < 0.0 {
                continue;
            }
            let Some(index) = step_index(s, shading.extend) else {
                continue;
            };
            if let Some(rgb) = table[index] {
                put(pixmap, col, row, rgb, alpha);
            }
        }
    }
}

fn draw_function(pixmap: &mut Pixmap, shading: &Shading, matrix: &Matrix, alpha: f32) {
    let (xmin, xmax, ymin, ymax) = match shading.domain[..] {
        [x0, x1, y0, y1, ..] => (x0, x1, y0, y1),
        _ => (0.0, 1.0, 0.0, 1.0),
    };
    let inverse = shading.matrix.multiply(matrix).inverse();
    let a = alpha_byte(alpha);
    for row in 0..pixmap.height() {
        for col in 0..pixmap.width() {
            let p = inverse.transform_point(col as f32 + 0.5, row as f32 + 0.5);
            if p.x < xmin || p.x > xmax || p.y < ymin || p.y > ymax {
                continue;
            }
            if let Some(rgb) = shading.color_at(&[p.x, p.y]) {
                put(pixmap, col, row, rgb.to_bytes(), a);
            }
        }
    }
}

/// Fill one triangle, interpolating the vertices' color inputs.
fn fill_triangle(pixmap: &mut Pixmap, shading: &Shading, points: &[Point; 3], vertices: &[MeshVertex; 3], alpha: f32) {
    let [p0, p1, p2] = *points;
    let area = (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y);
    if area.abs() < f32::EPSILON {
        return;
    }
    let min_x = p0.x.min(p1.x).min(p2.x).floor().max(0.0) as u32;
    let max_x = p0.x.max(p1.x).max(p2.x).ceil().min(pixmap.width() as f32) as u32;
    let min_y = p0.y.min(p1.y).min(p2.y).floor().max(0.0) as u32;
    let max_y = p0.y.max(p1.y).max(p2.y).ceil().min(pixmap.height() as f32) as u32;
    let a = alpha_byte(alpha);
    let components = vertices[0].color.len();
    let mut inputs = vec![0.0; components];
    for y in min_y..max_y {
        for x in min_x..max_x {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = ((p1.x - px) * (p2.y - py) - (p2.x - px) * (p1.y - py)) / area;
            let w1 = ((p2.x - px) * (p0.y - py) - (p0.x - px) * (p2.y - py)) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            for (k, input) in inputs.iter_mut().enumerate() {
                let at = |v: &MeshVertex| v.color.get(k).copied().unwrap_or(0.0);
                *input = w0 * at(&vertices[0]) + w1 * at(&vertices[1]) + w2 * at(&vertices[2]);
            }
            if let Some(rgb) = shading.color_at(&inputs) {
                put(pixmap, x, y, rgb.to_bytes(), a);
            }
        }
    }
}

fn draw_patches(pixmap: &mut Pixmap, shading: &Shading, matrix: &Matrix, alpha: f32) {
    for patch in patches(shading) {
        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        for p in patch.points.iter().flatten() {
            let d = matrix.transform(*p);
            min = Point::new(min.x.min(d.x), min.y.min(d.y));
            max = Point::new(max.x.max(d.x), max.y.max(d.y));
        }
        let extent = (max.x - min.x).max(max.y - min.y);
        let n = ((extent / 4.0).ceil() as usize).clamp(1, MAX_PATCH_GRID);

        let mut grid = Vec::with_capacity((n + 1) * (n + 1));
        for i in 0..=n {
            for j in 0..=n {
                let (u, v) = (i as f32 / n as f32, j as f32 / n as f32);
                grid.push(MeshVertex {
                    point: matrix.transform(patch.point_at(u, v)),
                    color: patch.color_at(u, v),
                });
            }
        }
        let at = |i: usize, j: usize| &grid[i * (n + 1) + j];
        for i in 0..n {
            for j in 0..n {
                let quad = [at(i, j), at(i + 1, j), at(i + 1, j + 1), at(i, j + 1)];
                for tri in [[0, 1, 2], [0, 2, 3]] {
                    let vertices = tri.map(|k| quad[k].clone());
                    let points = vertices.clone().map(|v| v.point);
                    fill_triangle(pixmap, shading, &points, &vertices, alpha);
                }
            }
        }
    }
}
