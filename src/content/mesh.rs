//! Packed geometry of mesh shadings (types 4 to 7).
//!
//! Vertex and patch records are read MSB first. Every record of a triangle
//! mesh, and every patch, starts on a byte boundary.

use crate::content::bitstream::{BitReader, max_value};
use crate::content::pattern::{Shading, ShadingType};
use crate::document::Document;
use crate::geometry::{Matrix, Point, Rect};
use crate::object::Dict;

/// Stream parameters of a mesh shading.
#[derive(Debug, Clone)]
pub struct MeshParams {
    data: Vec<u8>,
    bits_per_coordinate: u32,
    bits_per_component: u32,
    bits_per_flag: u32,
    decode: Vec<f32>,
    vertices_per_row: usize,
    components: usize,
}

impl MeshParams {
    /// Read the mesh parameters of a shading dictionary.
    ///
    /// `components` is 1 when the shading has a color function, the color
    /// space's component count otherwise.
    pub fn load(doc: &Document, dict: &Dict, data: Vec<u8>, components: usize) -> Option<Self> {
        let int = |key: &str| doc.dict_get(dict, key).as_integer();
        let bits_per_coordinate = int("BitsPerCoordinate")? as u32;
        if !matches!(bits_per_coordinate, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
            return None;
        }
        let bits_per_component = int("BitsPerComponent")? as u32;
        if !matches!(bits_per_component, 1 | 2 | 4 | 8 | 12 | 16) {
            return None;
        }
        let bits_per_flag = int("BitsPerFlag").unwrap_or(8) as u32;
        let decode = dict.get("Decode").and_then(|o| doc.number_array(o))?;
        if decode.len() < 4 + components * 2 {
            return None;
        }
        Some(Self {
            data,
            bits_per_coordinate,
            bits_per_component,
            bits_per_flag: bits_per_flag.min(8),
            decode,
            vertices_per_row: int("VerticesPerRow").unwrap_or(0).max(0) as usize,
            components,
        })
    }
}

/// A mesh vertex with its color inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshVertex {
    /// Position in shading space
    pub point: Point,
    /// Color components (function input when the shading has a function)
    pub color: Vec<f32>,
}

/// A patch as a 4x4 tensor control grid: `points[i][j]` is p_ij.
///
/// Corner colors sit at p00, p03, p33 and p30, in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Control points
    pub points: [[Point; 4]; 4],
    /// Corner colors
    pub colors: [Vec<f32>; 4],
}

struct MeshReader<'a> {
    bits: BitReader<'a>,
    params: &'a MeshParams,
}

impl<'a> MeshReader<'a> {
    fn new(params: &'a MeshParams) -> Self {
        Self {
            bits: BitReader::new(&params.data),
            params,
        }
    }

    fn can_read_flag(&self) -> bool {
        !self.bits.is_eof(self.params.bits_per_flag)
    }

    fn read_flag(&mut self) -> u32 {
        self.bits.read(self.params.bits_per_flag) & 0x03
    }

    fn can_read_coords(&self) -> bool {
        !self.bits.is_eof(self.params.bits_per_coordinate * 2)
    }

    fn read_coords(&mut self) -> Point {
        let max = max_value(self.params.bits_per_coordinate);
        let d = &self.params.decode;
        let x = self.bits.read(self.params.bits_per_coordinate) as f32;
        let y = self.bits.read(self.params.bits_per_coordinate) as f32;
        Point::new(d[0] + x * (d[1] - d[0]) / max, d[2] + y * (d[3] - d[2]) / max)
    }

    fn can_read_color(&self) -> bool {
        !self
            .bits
            .is_eof(self.params.bits_per_component * self.params.components as u32)
    }

    fn read_color(&mut self) -> Vec<f32> {
        let max = max_value(self.params.bits_per_component);
        (0..self.params.components)
            .map(|i| {
                let raw = self.bits.read(self.params.bits_per_component) as f32;
                let min = self.params.decode[4 + i * 2];
                let hi = self.params.decode[5 + i * 2];
                min + raw * (hi - min) / max
            })
            .collect()
    }

    fn read_vertex(&mut self) -> Option<MeshVertex> {
        if !self.can_read_coords() {
            return None;
        }
        let point = self.read_coords();
        if !self.can_read_color() {
            return None;
        }
        let color = self.read_color();
        self.bits.align();
        Some(MeshVertex { point, color })
    }
}

/// Triangles of a free-form or lattice mesh.
pub fn triangles(shading: &Shading) -> Vec<[MeshVertex; 3]> {
    let Some(params) = &shading.mesh else {
        return Vec::new();
    };
    let mut reader = MeshReader::new(params);
    let mut out = Vec::new();
    match shading.shading_type {
        ShadingType::FreeFormTriangles => {
            let mut current: Option<[MeshVertex; 3]> = None;
            while reader.can_read_flag() {
                let flag = reader.read_flag();
                let Some(vertex) = reader.read_vertex() else {
                    break;
                };
                let tri = match (flag, current.take()) {
                    (1, Some([_, b, c])) => [b, c, vertex],
                    (2, Some([a, _, c])) => [a, c, vertex],
                    _ => {
                        let mut rest = Vec::with_capacity(2);
                        for _ in 0..2 {
                            if !reader.can_read_flag() {
                                break;
                            }
                            reader.read_flag();
                            match reader.read_vertex() {
                                Some(v) => rest.push(v),
                                None => break,
                            }
                        }
                        let mut rest = rest.into_iter();
                        match (rest.next(), rest.next()) {
                            (Some(b), Some(c)) => [vertex, b, c],
                            _ => break,
                        }
                    },
                };
                out.push(tri.clone());
                current = Some(tri);
            }
        },
        ShadingType::LatticeTriangles => {
            let per_row = params.vertices_per_row;
            if per_row < 2 {
                return out;
            }
            let mut previous: Option<Vec<MeshVertex>> = None;
            'rows: loop {
                let mut row = Vec::with_capacity(per_row);
                for _ in 0..per_row {
                    match reader.read_vertex() {
                        Some(v) => row.push(v),
                        None => break 'rows,
                    }
                }
                if let Some(prev) = &previous {
                    for i in 1..per_row {
                        out.push([prev[i - 1].clone(), prev[i].clone(), row[i - 1].clone()]);
                        out.push([prev[i].clone(), row[i - 1].clone(), row[i].clone()]);
                    }
                }
                previous = Some(row);
            }
        },
        _ => {},
    }
    out
}

// Boundary order of patch points: p00 p01 p02 p03 p13 p23 p33 p32 p31 p30 p20 p10.
const BOUNDARY: [(usize, usize); 12] = [
    (0, 0),
    (0, 1),
    (0, 2),
    (0, 3),
    (1, 3),
    (2, 3),
    (3, 3),
    (3, 2),
    (3, 1),
    (3, 0),
    (2, 0),
    (1, 0),
];

// Interior order of tensor patches: p11 p12 p22 p21.
const INTERIOR: [(usize, usize); 4] = [(1, 1), (1, 2), (2, 2), (2, 1)];

/// Patches of a Coons or tensor-product mesh.
pub fn patches(shading: &Shading) -> Vec<Patch> {
    let Some(params) = &shading.mesh else {
        return Vec::new();
    };
    let tensor = shading.shading_type == ShadingType::TensorPatches;
    if !tensor && shading.shading_type != ShadingType::CoonsPatches {
        return Vec::new();
    }
    let mut reader = MeshReader::new(params);
    let mut out: Vec<Patch> = Vec::new();
    while reader.can_read_flag() {
        let flag = reader.read_flag();
        let mut boundary = [Point::default(); 12];
        let mut colors: [Vec<f32>; 4] = Default::default();
        let (first_point, first_color) = match (flag, out.last()) {
            (0, _) | (_, None) => (0, 0),
            (f, Some(prev)) => {
                let prev_boundary: Vec<Point> = BOUNDARY.iter().map(|&(i, j)| prev.points[i][j]).collect();
                let start = (f as usize) * 3;
                for k in 0..4 {
                    boundary[k] = prev_boundary[(start + k) % 12];
                }
                colors[0] = prev.colors[f as usize % 4].clone();
                colors[1] = prev.colors[(f as usize + 1) % 4].clone();
                (4, 2)
            },
        };
        let mut complete = true;
        for slot in boundary.iter_mut().skip(first_point) {
            if !reader.can_read_coords() {
                complete = false;
                break;
            }
            *slot = reader.read_coords();
        }
        let mut interior = [Point::default(); 4];
        if complete && tensor {
            for slot in interior.iter_mut() {
                if !reader.can_read_coords() {
                    complete = false;
                    break;
                }
                *slot = reader.read_coords();
            }
        }
        if complete {
            for slot in colors.iter_mut().skip(first_color) {
                if !reader.can_read_color() {
                    complete = false;
                    break;
                }
                *slot = reader.read_color();
            }
        }
        if !complete {
            break;
        }
        reader.bits.align();

        let mut points = [[Point::default(); 4]; 4];
        for (k, &(i, j)) in BOUNDARY.iter().enumerate() {
            points[i][j] = boundary[k];
        }
        if tensor {
            for (k, &(i, j)) in INTERIOR.iter().enumerate() {
                points[i][j] = interior[k];
            }
        } else {
            coons_interior(&mut points);
        }
        out.push(Patch { points, colors });
    }
    out
}

fn coons_interior(p: &mut [[Point; 4]; 4]) {
    let combine = |terms: &[(f32, Point)]| {
        let (x, y) = terms
            .iter()
            .fold((0.0, 0.0), |(x, y), (w, pt)| (x + w * pt.x, y + w * pt.y));
        Point::new(x / 9.0, y / 9.0)
    };
    let q = *p;
    p[1][1] = combine(&[
        (-4.0, q[0][0]),
        (6.0, q[0][1]),
        (6.0, q[1][0]),
        (-2.0, q[0][3]),
        (-2.0, q[3][0]),
        (3.0, q[3][1]),
        (3.0, q[1][3]),
        (-1.0, q[3][3]),
    ]);
    p[1][2] = combine(&[
        (-4.0, q[0][3]),
        (6.0, q[0][2]),
        (6.0, q[1][3]),
        (-2.0, q[0][0]),
        (-2.0, q[3][3]),
        (3.0, q[3][2]),
        (3.0, q[1][0]),
        (-1.0, q[3][0]),
    ]);
    p[2][1] = combine(&[
        (-4.0, q[3][0]),
        (6.0, q[3][1]),
        (6.0, q[2][0]),
        (-2.0, q[3][3]),
        (-2.0, q[0][0]),
        (3.0, q[0][1]),
        (3.0, q[2][3]),
        (-1.0, q[0][3]),
    ]);
    p[2][2] = combine(&[
        (-4.0, q[3][3]),
        (6.0, q[3][2]),
        (6.0, q[2][3]),
        (-2.0, q[3][0]),
        (-2.0, q[0][3]),
        (3.0, q[0][2]),
        (3.0, q[2][0]),
        (-1.0, q[0][0]),
    ]);
}

impl Patch {
    /// Point on the patch surface at (u, v) in [0, 1]^2.
    pub fn point_at(&self, u: f32, v: f32) -> Point {
        let bu = bernstein(u);
        let bv = bernstein(v);
        let mut x = 0.0;
        let mut y = 0.0;
        for (i, wu) in bu.iter().enumerate() {
            for (j, wv) in bv.iter().enumerate() {
                let p = self.points[i][j];
                x += wu * wv * p.x;
                y += wu * wv * p.y;
            }
        }
        Point::new(x, y)
    }

    /// Bilinear color at (u, v).
    pub fn color_at(&self, u: f32, v: f32) -> Vec<f32> {
        let [c0, c1, c2, c3] = &self.colors;
        (0..c0.len())
            .map(|k| {
                let at = |c: &Vec<f32>| c.get(k).copied().unwrap_or(0.0);
                (1.0 - u) * (1.0 - v) * at(c0) + (1.0 - u) * v * at(c1) + u * v * at(c2) + u * (1.0 - v) * at(c3)
            })
            .collect()
    }
}

fn bernstein(t: f32) -> [f32; 4] {
    let s = 1.0 - t;
    [s * s * s, 3.0 * t * s * s, 3.0 * t * t * s, t * t * t]
}

/// Bounding box of all mesh coordinates under `matrix`.
///
/// Color data is skipped without decoding. Returns `None` for an empty or
/// unreadable mesh.
pub fn mesh_bounds(shading: &Shading, matrix: &Matrix) -> Option<Rect> {
    let params = shading.mesh.as_ref()?;
    let gouraud = matches!(
        shading.shading_type,
        ShadingType::FreeFormTriangles | ShadingType::LatticeTriangles
    );
    let (full_points, full_colors) = match shading.shading_type {
        ShadingType::TensorPatches => (16, 4),
        ShadingType::CoonsPatches => (12, 4),
        _ => (1, 1),
    };
    let mut reader = MeshReader::new(params);
    let mut rect: Option<Rect> = None;
    while !reader.bits.is_eof(1) {
        let mut flag = 0;
        if shading.shading_type != ShadingType::LatticeTriangles {
            if !reader.can_read_flag() {
                break;
            }
            flag = reader.read_flag();
        }
        let (points, colors) = if !gouraud && flag != 0 {
            (full_points - 4, full_colors - 2)
        } else {
            (full_points, full_colors)
        };
        for _ in 0..points {
            if !reader.can_read_coords() {
                break;
            }
            let p = reader.read_coords();
            match rect.as_mut() {
                Some(r) => r.update_point(p),
                None => rect = Some(Rect::new(p.x, p.y, p.x, p.y)),
            }
        }
        let skip = params.components * params.bits_per_component as usize * colors;
        let target = (params.data.len() * 8).saturating_sub(reader.bits.bits_left()) + skip;
        reader.bits.seek_bits(target);
        reader.bits.align();
    }
    rect.map(|r| matrix.transform_rect(&r))
}
