//! Tiling patterns, shading patterns and shading dictionaries.

use crate::content::color::{ColorSpace, ColorSpaceFamily, RgbColor};
use crate::content::function::{Function, evaluate_list, load_function_list};
use crate::content::mesh::MeshParams;
use crate::document::Document;
use crate::geometry::{Matrix, Rect};
use crate::object::{Dict, Object};
use std::rc::Rc;

/// A pattern resource.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// PatternType 1
    Tiling(TilingPattern),
    /// PatternType 2, or a bare shading painted by `sh`
    Shading(ShadingPattern),
}

/// A tiling pattern: a content stream cell repeated over the filled area.
#[derive(Debug, Clone)]
pub struct TilingPattern {
    /// PaintType 1: the cell carries its own colors
    pub colored: bool,
    /// TilingType (1, 2 or 3)
    pub tiling_type: i32,
    /// Cell bounding box in pattern space
    pub bbox: Rect,
    /// Horizontal spacing
    pub x_step: f32,
    /// Vertical spacing
    pub y_step: f32,
    /// Pattern space to user space
    pub matrix: Matrix,
    /// The pattern stream (indirect when the pattern is)
    pub stream: Object,
}

/// A shading used as a pattern.
#[derive(Debug, Clone)]
pub struct ShadingPattern {
    /// The shading
    pub shading: Rc<Shading>,
    /// Pattern space to user space (identity for `sh`)
    pub matrix: Matrix,
    /// The pattern's ExtGState, if any
    pub ext_gstate: Option<Dict>,
}

impl Pattern {
    /// Load a pattern resource; indirect patterns are cached.
    pub fn load(doc: &Document, obj: &Object) -> Option<Rc<Pattern>> {
        let obj_ref = obj.as_reference();
        if let Some(r) = obj_ref {
            if let Some(p) = doc.cache.patterns.borrow().get(&r) {
                return Some(p.clone());
            }
        }
        let resolved = doc.resolve(obj);
        let dict = resolved.as_dict()?;
        let matrix = dict
            .get("Matrix")
            .and_then(|o| doc.number_array(o))
            .map(|v| Matrix::from_array(&v))
            .unwrap_or_default();
        let pattern = match doc.dict_get(dict, "PatternType").as_integer() {
            Some(1) => {
                if resolved.as_stream().is_none() {
                    return None;
                }
                let bbox = dict
                    .get("BBox")
                    .and_then(|o| doc.number_array(o))
                    .and_then(|v| Rect::from_array(&v))?;
                Pattern::Tiling(TilingPattern {
                    colored: doc.dict_get(dict, "PaintType").as_integer() != Some(2),
                    tiling_type: doc.dict_get(dict, "TilingType").as_integer().unwrap_or(1) as i32,
                    bbox,
                    x_step: doc.dict_get_number(dict, "XStep").unwrap_or(bbox.width()),
                    y_step: doc.dict_get_number(dict, "YStep").unwrap_or(bbox.height()),
                    matrix,
                    stream: obj.clone(),
                })
            },
            Some(2) => Pattern::Shading(ShadingPattern {
                shading: Shading::load(doc, dict.get("Shading")?)?,
                matrix,
                ext_gstate: doc.dict_get_dict(dict, "ExtGState").cloned(),
            }),
            other => {
                log::debug!("Unsupported pattern type {:?}", other);
                return None;
            },
        };
        let pattern = Rc::new(pattern);
        if let Some(r) = obj_ref {
            doc.cache.patterns.borrow_mut().insert(r, pattern.clone());
        }
        Some(pattern)
    }

    /// Wrap a bare shading for the `sh` operator.
    pub fn from_shading(shading: Rc<Shading>) -> Pattern {
        Pattern::Shading(ShadingPattern {
            shading,
            matrix: Matrix::identity(),
            ext_gstate: None,
        })
    }

    /// Pattern space to user space.
    pub fn matrix(&self) -> Matrix {
        match self {
            Pattern::Tiling(t) => t.matrix,
            Pattern::Shading(s) => s.matrix,
        }
    }

    /// The same pattern placed under a parent matrix (the form or page
    /// matrix the pattern was selected in).
    pub fn with_parent_matrix(self: &Rc<Self>, parent: &Matrix) -> Rc<Pattern> {
        if parent.is_identity() {
            return self.clone();
        }
        let mut placed = (**self).clone();
        match &mut placed {
            Pattern::Tiling(t) => t.matrix.concat(parent),
            Pattern::Shading(s) => s.matrix.concat(parent),
        }
        Rc::new(placed)
    }
}

/// Shading types 1 to 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ShadingType {
    /// Function-based
    Function,
    /// Axial
    Axial,
    /// Radial
    Radial,
    /// Free-form Gouraud-shaded triangle mesh
    FreeFormTriangles,
    /// Lattice-form Gouraud-shaded triangle mesh
    LatticeTriangles,
    /// Coons patch mesh
    CoonsPatches,
    /// Tensor-product patch mesh
    TensorPatches,
}

impl ShadingType {
    /// From the `ShadingType` integer.
    pub fn from_int(value: i64) -> Option<Self> {
        Some(match value {
            1 => ShadingType::Function,
            2 => ShadingType::Axial,
            3 => ShadingType::Radial,
            4 => ShadingType::FreeFormTriangles,
            5 => ShadingType::LatticeTriangles,
            6 => ShadingType::CoonsPatches,
            7 => ShadingType::TensorPatches,
            _ => return None,
        })
    }

    /// Types whose geometry is read from a packed stream.
    pub fn is_mesh(self) -> bool {
        matches!(
            self,
            ShadingType::FreeFormTriangles
                | ShadingType::LatticeTriangles
                | ShadingType::CoonsPatches
                | ShadingType::TensorPatches
        )
    }
}

/// A shading dictionary.
#[derive(Debug)]
pub struct Shading {
    /// Shading type
    pub shading_type: ShadingType,
    /// Color space of the shading's colors
    pub color_space: Rc<ColorSpace>,
    /// Color functions (one n-output or n one-output functions)
    pub functions: Vec<Rc<Function>>,
    /// Color painted outside the shading's geometry, if any
    pub background: Option<Vec<f32>>,
    /// Shading-space clip
    pub bbox: Option<Rect>,
    /// `Coords` of axial and radial shadings
    pub coords: Vec<f32>,
    /// `Domain` (t0 t1, or x0 x1 y0 y1 for type 1)
    pub domain: Vec<f32>,
    /// `Extend` flags
    pub extend: [bool; 2],
    /// `Matrix` of function-based shadings
    pub matrix: Matrix,
    /// Packed geometry of mesh shadings
    pub mesh: Option<MeshParams>,
}

impl Shading {
    /// Load and validate a shading dictionary or stream.
    pub fn load(doc: &Document, obj: &Object) -> Option<Rc<Shading>> {
        let obj_ref = obj.as_reference();
        if let Some(r) = obj_ref {
            if let Some(s) = doc.cache.shadings.borrow().get(&r) {
                return Some(s.clone());
            }
        }
        let resolved = doc.resolve(obj);
        let dict = resolved.as_dict()?;
        let shading_type = ShadingType::from_int(doc.dict_get(dict, "ShadingType").as_integer()?)?;
        let color_space = ColorSpace::load(doc, dict.get("ColorSpace")?)?;
        if color_space.family() == ColorSpaceFamily::Pattern {
            return None;
        }
        let functions = dict
            .get("Function")
            .map(|f| load_function_list(doc, f))
            .unwrap_or_default();
        let needs_function = matches!(
            shading_type,
            ShadingType::Function | ShadingType::Axial | ShadingType::Radial
        );
        if needs_function && functions.is_empty() {
            log::debug!("Shading type {:?} without a function", shading_type);
            return None;
        }
        let numbers = |key: &str| dict.get(key).and_then(|o| doc.number_array(o));
        let coords = numbers("Coords").unwrap_or_default();
        match shading_type {
            ShadingType::Axial if coords.len() < 4 => return None,
            ShadingType::Radial if coords.len() < 6 => return None,
            _ => {},
        }
        let domain = numbers("Domain").unwrap_or_else(|| match shading_type {
            ShadingType::Function => vec![0.0, 1.0, 0.0, 1.0],
            _ => vec![0.0, 1.0],
        });
        let extend = match doc.dict_get(dict, "Extend").as_array() {
            Some(arr) => [
                arr.first().and_then(|o| doc.resolve(o).as_bool()).unwrap_or(false),
                arr.get(1).and_then(|o| doc.resolve(o).as_bool()).unwrap_or(false),
            ],
            None => [false, false],
        };
        let mesh = if shading_type.is_mesh() {
            let data = doc.decode_stream(resolved).ok()?;
            let components = if functions.is_empty() { color_space.components() } else { 1 };
            Some(MeshParams::load(doc, dict, data, components)?)
        } else {
            None
        };

        let shading = Rc::new(Shading {
            shading_type,
            color_space,
            functions,
            background: numbers("Background"),
            bbox: numbers("BBox").and_then(|v| Rect::from_array(&v)),
            coords,
            domain,
            extend,
            matrix: numbers("Matrix").map(|v| Matrix::from_array(&v)).unwrap_or_default(),
            mesh,
        });
        if let Some(r) = obj_ref {
            doc.cache.shadings.borrow_mut().insert(r, shading.clone());
        }
        Some(shading)
    }

    /// Color for function inputs (or raw mesh color components).
    pub fn color_at(&self, inputs: &[f32]) -> Option<RgbColor> {
        if self.functions.is_empty() {
            self.color_space.to_rgb(inputs)
        } else {
            self.color_space.to_rgb(&evaluate_list(&self.functions, inputs))
        }
    }

    /// Background color, when the shading has one.
    pub fn background_rgb(&self) -> Option<RgbColor> {
        self.background.as_ref().and_then(|b| self.color_space.to_rgb(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num_array(values: &[f32]) -> Object {
        Object::Array(values.iter().map(|v| Object::Real(*v as f64)).collect())
    }

    fn axial_dict() -> Dict {
        let mut f = Dict::new();
        f.insert("FunctionType".into(), Object::Integer(2));
        f.insert("Domain".into(), num_array(&[0.0, 1.0]));
        f.insert("C0".into(), num_array(&[1.0, 0.0, 0.0]));
        f.insert("C1".into(), num_array(&[0.0, 0.0, 1.0]));
        f.insert("N".into(), Object::Integer(1));
        let mut d = Dict::new();
        d.insert("ShadingType".into(), Object::Integer(2));
        d.insert("ColorSpace".into(), Object::Name("DeviceRGB".into()));
        d.insert("Coords".into(), num_array(&[0.0, 0.0, 100.0, 0.0]));
        d.insert("Function".into(), Object::Dictionary(f));
        d.insert(
            "Extend".into(),
            Object::Array(vec![Object::Boolean(true), Object::Boolean(false)]),
        );
        d
    }

    #[test]
    fn test_load_axial_shading() {
        let doc = Document::new();
        let shading = Shading::load(&doc, &Object::Dictionary(axial_dict())).unwrap();
        assert_eq!(shading.shading_type, ShadingType::Axial);
        assert_eq!(shading.extend, [true, false]);
        assert_eq!(shading.domain, vec![0.0, 1.0]);
        let mid = shading.color_at(&[0.5]).unwrap();
        assert!((mid.r - 0.5).abs() < 1e-3 && (mid.b - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_axial_without_function_is_rejected() {
        let doc = Document::new();
        let mut d = axial_dict();
        d.shift_remove("Function");
        assert!(Shading::load(&doc, &Object::Dictionary(d)).is_none());
    }

    #[test]
    fn test_shading_pattern_is_cached() {
        let mut doc = Document::new();
        let mut p = Dict::new();
        p.insert("PatternType".into(), Object::Integer(2));
        p.insert("Shading".into(), Object::Dictionary(axial_dict()));
        p.insert("Matrix".into(), num_array(&[2.0, 0.0, 0.0, 2.0, 0.0, 0.0]));
        let r = doc.add(Object::Dictionary(p));
        let a = Pattern::load(&doc, &Object::Reference(r)).unwrap();
        let b = Pattern::load(&doc, &Object::Reference(r)).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.matrix(), Matrix::scaling(2.0, 2.0));
        let placed = a.with_parent_matrix(&Matrix::translation(10.0, 0.0));
        assert_eq!(placed.matrix(), Matrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 0.0));
    }

    #[test]
    fn test_tiling_pattern() {
        let mut doc = Document::new();
        let mut d = Dict::new();
        d.insert("PatternType".into(), Object::Integer(1));
        d.insert("PaintType".into(), Object::Integer(2));
        d.insert("BBox".into(), num_array(&[0.0, 0.0, 10.0, 10.0]));
        d.insert("XStep".into(), Object::Integer(20));
        d.insert("YStep".into(), Object::Integer(20));
        let r = doc.add(Object::Stream {
            dict: d,
            data: bytes::Bytes::from_static(b"0 0 5 5 re f"),
        });
        let pattern = Pattern::load(&doc, &Object::Reference(r)).unwrap();
        match pattern.as_ref() {
            Pattern::Tiling(t) => {
                assert!(!t.colored);
                assert_eq!(t.x_step, 20.0);
                assert_eq!(t.bbox, Rect::new(0.0, 0.0, 10.0, 10.0));
            },
            Pattern::Shading(_) => panic!("expected a tiling pattern"),
        }
    }
}
