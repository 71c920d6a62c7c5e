//! PDF functions (sampled, exponential, stitching, PostScript calculator).
//!
//! Functions map m inputs to n outputs. They drive tint transforms of
//! Separation and DeviceN color spaces, shading colors and transfer
//! functions.

use crate::content::bitstream::{BitReader, max_value};
use crate::document::Document;
use crate::object::{Dict, Object};
use std::rc::Rc;

/// Maximum nesting of stitching functions.
const MAX_FUNCTION_DEPTH: u32 = 8;

/// Maximum PostScript operand stack size.
const PS_STACK_SIZE: usize = 100;

/// A parsed PDF function.
#[derive(Debug, Clone)]
pub struct Function {
    domain: Vec<f32>,
    range: Option<Vec<f32>>,
    outputs: usize,
    kind: FunctionKind,
}

#[derive(Debug, Clone)]
enum FunctionKind {
    Sampled {
        size: Vec<u32>,
        bits_per_sample: u32,
        encode: Vec<f32>,
        decode: Vec<f32>,
        data: Vec<u8>,
    },
    Exponential {
        c0: Vec<f32>,
        c1: Vec<f32>,
        exponent: f32,
    },
    Stitching {
        functions: Vec<Rc<Function>>,
        bounds: Vec<f32>,
        encode: Vec<f32>,
    },
    PostScript(Vec<PsOp>),
}

fn interpolate(x: f32, x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> f32 {
    if x_max == x_min {
        return y_min;
    }
    y_min + (x - x_min) * (y_max - y_min) / (x_max - x_min)
}

fn clip(value: f32, bounds: &[f32], i: usize) -> f32 {
    match (bounds.get(2 * i), bounds.get(2 * i + 1)) {
        (Some(&lo), Some(&hi)) if lo <= hi => value.clamp(lo, hi),
        _ => value,
    }
}

impl Function {
    /// Load a function, using the document cache for indirect objects.
    pub fn load(doc: &Document, obj: &Object) -> Option<Rc<Function>> {
        Self::load_at_depth(doc, obj, 0)
    }

    fn load_at_depth(doc: &Document, obj: &Object, depth: u32) -> Option<Rc<Function>> {
        if depth > MAX_FUNCTION_DEPTH {
            log::warn!("Function nesting too deep");
            return None;
        }
        if let Some(r) = obj.as_reference() {
            if let Some(f) = doc.cache.functions.borrow().get(&r) {
                return Some(f.clone());
            }
        }
        let resolved = doc.resolve(obj);
        let dict = resolved.as_dict()?;
        let function_type = doc.dict_get(dict, "FunctionType").as_integer()?;
        let domain = doc.number_array(dict.get("Domain")?)?;
        if domain.len() < 2 {
            return None;
        }
        let range = dict.get("Range").and_then(|o| doc.number_array(o));

        let (kind, outputs) = match function_type {
            0 => Self::load_sampled(doc, resolved, dict, &domain, range.as_deref())?,
            2 => Self::load_exponential(doc, dict),
            3 => Self::load_stitching(doc, dict, depth)?,
            4 => {
                let data = doc.decode_stream(resolved).ok()?;
                let program = parse_postscript(&data)?;
                (FunctionKind::PostScript(program), range.as_ref().map_or(1, |r| r.len() / 2))
            },
            other => {
                log::debug!("Unsupported function type {}", other);
                return None;
            },
        };
        if outputs == 0 {
            return None;
        }

        let func = Rc::new(Function {
            domain,
            range,
            outputs,
            kind,
        });
        if let Some(r) = obj.as_reference() {
            doc.cache.functions.borrow_mut().insert(r, func.clone());
        }
        Some(func)
    }

    fn load_sampled(
        doc: &Document,
        stream: &Object,
        dict: &Dict,
        domain: &[f32],
        range: Option<&[f32]>,
    ) -> Option<(FunctionKind, usize)> {
        let range = range?;
        let inputs = domain.len() / 2;
        let outputs = range.len() / 2;
        let size: Vec<u32> = doc
            .number_array(dict.get("Size")?)?
            .into_iter()
            .map(|v| v.max(1.0) as u32)
            .collect();
        if size.len() < inputs {
            return None;
        }
        let bits_per_sample = doc.dict_get(dict, "BitsPerSample").as_integer()? as u32;
        if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
            return None;
        }
        let encode = dict
            .get("Encode")
            .and_then(|o| doc.number_array(o))
            .filter(|e| e.len() >= 2 * inputs)
            .unwrap_or_else(|| size.iter().flat_map(|&s| [0.0, (s - 1) as f32]).collect());
        let decode = dict
            .get("Decode")
            .and_then(|o| doc.number_array(o))
            .filter(|d| d.len() >= 2 * outputs)
            .unwrap_or_else(|| range.to_vec());
        let data = doc.decode_stream(stream).ok()?;

        let total: u64 = size.iter().take(inputs).map(|&s| s as u64).product::<u64>()
            * outputs as u64
            * bits_per_sample as u64;
        if total.div_ceil(8) > data.len() as u64 {
            log::debug!("Sampled function data too short");
            return None;
        }
        Some((
            FunctionKind::Sampled {
                size,
                bits_per_sample,
                encode,
                decode,
                data,
            },
            outputs,
        ))
    }

    fn load_exponential(doc: &Document, dict: &Dict) -> (FunctionKind, usize) {
        let c0 = dict.get("C0").and_then(|o| doc.number_array(o)).unwrap_or_else(|| vec![0.0]);
        let c1 = dict.get("C1").and_then(|o| doc.number_array(o)).unwrap_or_else(|| vec![1.0]);
        let exponent = doc.dict_get_number(dict, "N").unwrap_or(1.0);
        let outputs = c0.len().min(c1.len());
        (FunctionKind::Exponential { c0, c1, exponent }, outputs)
    }

    fn load_stitching(doc: &Document, dict: &Dict, depth: u32) -> Option<(FunctionKind, usize)> {
        let list = doc.dict_get(dict, "Functions").as_array()?;
        let functions: Vec<Rc<Function>> = list
            .iter()
            .map(|f| Self::load_at_depth(doc, f, depth + 1))
            .collect::<Option<_>>()?;
        let k = functions.len();
        if k == 0 {
            return None;
        }
        let bounds = dict.get("Bounds").and_then(|o| doc.number_array(o)).unwrap_or_default();
        if bounds.len() + 1 < k {
            return None;
        }
        let encode = dict
            .get("Encode")
            .and_then(|o| doc.number_array(o))
            .filter(|e| e.len() >= 2 * k)
            .unwrap_or_else(|| (0..k).flat_map(|_| [0.0, 1.0]).collect());
        let outputs = functions[0].outputs;
        Some((
            FunctionKind::Stitching {
                functions,
                bounds,
                encode,
            },
            outputs,
        ))
    }

    /// Build an exponential function directly (used by tests and defaults).
    pub fn exponential(c0: Vec<f32>, c1: Vec<f32>, exponent: f32) -> Function {
        let outputs = c0.len().min(c1.len());
        Function {
            domain: vec![0.0, 1.0],
            range: None,
            outputs,
            kind: FunctionKind::Exponential { c0, c1, exponent },
        }
    }

    /// Number of inputs.
    pub fn inputs(&self) -> usize {
        self.domain.len() / 2
    }

    /// Number of outputs.
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    /// Evaluate the function. Missing inputs read as 0.
    pub fn evaluate(&self, inputs: &[f32]) -> Vec<f32> {
        let m = self.inputs();
        let clipped: Vec<f32> = (0..m)
            .map(|i| clip(inputs.get(i).copied().unwrap_or(0.0), &self.domain, i))
            .collect();

        let mut out = match &self.kind {
            FunctionKind::Exponential { c0, c1, exponent } => {
                let x = clipped[0];
                let xn = x.powf(*exponent);
                (0..self.outputs).map(|j| c0[j] + xn * (c1[j] - c0[j])).collect()
            },
            FunctionKind::Stitching {
                functions,
                bounds,
                encode,
            } => {
                let x = clipped[0];
                let k = functions.len();
                let i = bounds.iter().take(k - 1).position(|&b| x < b).unwrap_or(k - 1);
                let low = if i == 0 { self.domain[0] } else { bounds[i - 1] };
                let high = if i == k - 1 { self.domain[1] } else { bounds[i] };
                let t = interpolate(x, low, high, encode[2 * i], encode[2 * i + 1]);
                functions[i].evaluate(&[t])
            },
            FunctionKind::Sampled {
                size,
                bits_per_sample,
                encode,
                decode,
                data,
            } => self.evaluate_sampled(&clipped, size, *bits_per_sample, encode, decode, data),
            FunctionKind::PostScript(program) => {
                let mut engine = PsEngine::default();
                for &v in &clipped {
                    engine.push(v as f64);
                }
                engine.execute(program);
                let n = self.outputs;
                let mut result = vec![0.0; n];
                for j in (0..n).rev() {
                    result[j] = engine.pop() as f32;
                }
                result
            },
        };

        if let Some(range) = &self.range {
            for (j, v) in out.iter_mut().enumerate() {
                *v = clip(*v, range, j);
            }
        }
        out.resize(self.outputs, 0.0);
        out
    }

    fn evaluate_sampled(
        &self,
        x: &[f32],
        size: &[u32],
        bps: u32,
        encode: &[f32],
        decode: &[f32],
        data: &[u8],
    ) -> Vec<f32> {
        let m = x.len().min(8);
        let n = self.outputs;
        let mut floor = vec![0u32; m];
        let mut frac = vec![0f32; m];
        for i in 0..m {
            let e = interpolate(x[i], self.domain[2 * i], self.domain[2 * i + 1], encode[2 * i], encode[2 * i + 1])
                .clamp(0.0, (size[i] - 1) as f32);
            floor[i] = e.floor() as u32;
            frac[i] = e - e.floor();
        }

        let sample = |index: &[u32], j: usize| -> f32 {
            let mut offset: u64 = 0;
            let mut stride: u64 = 1;
            for i in 0..m {
                offset += index[i] as u64 * stride;
                stride *= size[i] as u64;
            }
            let bit = (offset * n as u64 + j as u64) * bps as u64;
            let mut reader = BitReader::new(data);
            reader.seek_bits(bit as usize);
            reader.read(bps) as f32
        };

        let max = max_value(bps);
        (0..n)
            .map(|j| {
                let mut acc = 0.0;
                for corner in 0..(1u32 << m) {
                    let mut weight = 1.0;
                    let mut index = floor.clone();
                    for i in 0..m {
                        if corner & (1 << i) != 0 {
                            if index[i] + 1 < size[i] {
                                index[i] += 1;
                            }
                            weight *= frac[i];
                        } else {
                            weight *= 1.0 - frac[i];
                        }
                    }
                    if weight > 0.0 {
                        acc += weight * sample(&index, j);
                    }
                }
                interpolate(acc, 0.0, max, decode[2 * j], decode[2 * j + 1])
            })
            .collect()
    }
}

/// Load a `Function` entry that may be a single function or an array of
/// one-output functions.
pub fn load_function_list(doc: &Document, obj: &Object) -> Vec<Rc<Function>> {
    match doc.resolve(obj) {
        Object::Array(arr) => arr.iter().filter_map(|f| Function::load(doc, f)).collect(),
        Object::Null => Vec::new(),
        _ => Function::load(doc, obj).into_iter().collect(),
    }
}

/// Evaluate a function list: one function gives all outputs, several
/// functions give one output each.
pub fn evaluate_list(functions: &[Rc<Function>], inputs: &[f32]) -> Vec<f32> {
    match functions {
        [single] => single.evaluate(inputs),
        many => many.iter().flat_map(|f| f.evaluate(inputs)).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PsOperator {
    Abs,
    Add,
    Atan,
    Ceiling,
    Cos,
    Cvi,
    Cvr,
    Div,
    Exp,
    Floor,
    Idiv,
    Ln,
    Log,
    Mod,
    Mul,
    Neg,
    Round,
    Sin,
    Sqrt,
    Sub,
    Truncate,
    And,
    Or,
    Not,
    Xor,
    Bitshift,
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Ne,
    True,
    False,
    Copy,
    Dup,
    Exch,
    Index,
    Pop,
    Roll,
}

impl PsOperator {
    fn from_name(name: &[u8]) -> Option<Self> {
        use PsOperator::*;
        Some(match name {
            b"abs" => Abs,
            b"add" => Add,
            b"atan" => Atan,
            b"ceiling" => Ceiling,
            b"cos" => Cos,
            b"cvi" => Cvi,
            b"cvr" => Cvr,
            b"div" => Div,
            b"exp" => Exp,
            b"floor" => Floor,
            b"idiv" => Idiv,
            b"ln" => Ln,
            b"log" => Log,
            b"mod" => Mod,
            b"mul" => Mul,
            b"neg" => Neg,
            b"round" => Round,
            b"sin" => Sin,
            b"sqrt" => Sqrt,
            b"sub" => Sub,
            b"truncate" => Truncate,
            b"and" => And,
            b"or" => Or,
            b"not" => Not,
            b"xor" => Xor,
            b"bitshift" => Bitshift,
            b"eq" => Eq,
            b"ge" => Ge,
            b"gt" => Gt,
            b"le" => Le,
            b"lt" => Lt,
            b"ne" => Ne,
            b"true" => True,
            b"false" => False,
            b"copy" => Copy,
            b"dup" => Dup,
            b"exch" => Exch,
            b"index" => Index,
            b"pop" => Pop,
            b"roll" => Roll,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PsOp {
    Number(f64),
    Operator(PsOperator),
    If(Vec<PsOp>),
    IfElse(Vec<PsOp>, Vec<PsOp>),
}

/// Parse a calculator program `{ ... }`.
fn parse_postscript(data: &[u8]) -> Option<Vec<PsOp>> {
    let mut words = PsWords { data, pos: 0 };
    if words.next()? != b"{" {
        return None;
    }
    parse_ps_block(&mut words, 0)
}

struct PsWords<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PsWords<'a> {
    fn next(&mut self) -> Option<&'a [u8]> {
        while self.pos < self.data.len() && crate::lexer::is_whitespace(self.data[self.pos]) {
            self.pos += 1;
        }
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        if matches!(self.data[start], b'{' | b'}') {
            self.pos += 1;
            return Some(&self.data[start..self.pos]);
        }
        while self.pos < self.data.len()
            && !crate::lexer::is_whitespace(self.data[self.pos])
            && !matches!(self.data[self.pos], b'{' | b'}')
        {
            self.pos += 1;
        }
        Some(&self.data[start..self.pos])
    }
}

fn parse_ps_block(words: &mut PsWords<'_>, depth: u32) -> Option<Vec<PsOp>> {
    if depth > 16 {
        return None;
    }
    let mut ops = Vec::new();
    let mut pending: Vec<Vec<PsOp>> = Vec::new();
    loop {
        let word = words.next()?;
        match word {
            b"}" => return Some(ops),
            b"{" => pending.push(parse_ps_block(words, depth + 1)?),
            b"if" => {
                let block = pending.pop()?;
                ops.push(PsOp::If(block));
            },
            b"ifelse" => {
                let else_block = pending.pop()?;
                let then_block = pending.pop()?;
                ops.push(PsOp::IfElse(then_block, else_block));
            },
            _ => {
                if let Some(op) = PsOperator::from_name(word) {
                    ops.push(PsOp::Operator(op));
                } else {
                    let text = std::str::from_utf8(word).ok()?;
                    ops.push(PsOp::Number(text.parse().ok()?));
                }
            },
        }
    }
}

#[derive(Default)]
struct PsEngine {
    stack: Vec<f64>,
}

impl PsEngine {
    fn push(&mut self, v: f64) {
        if self.stack.len() < PS_STACK_SIZE {
            self.stack.push(v);
        }
    }

    fn pop(&mut self) -> f64 {
        self.stack.pop().unwrap_or(0.0)
    }

    fn execute(&mut self, program: &[PsOp]) {
        for op in program {
            match op {
                PsOp::Number(v) => self.push(*v),
                PsOp::If(block) => {
                    if self.pop() != 0.0 {
                        self.execute(block);
                    }
                },
                PsOp::IfElse(then_block, else_block) => {
                    if self.pop() != 0.0 {
                        self.execute(then_block);
                    } else {
                        self.execute(else_block);
                    }
                },
                PsOp::Operator(o) => self.apply(*o),
            }
        }
    }

    fn apply(&mut self, op: PsOperator) {
        use PsOperator::*;
        let bool_value = |b: bool| if b { 1.0 } else { 0.0 };
        match op {
            Abs => {
                let a = self.pop();
                self.push(a.abs());
            },
            Neg => {
                let a = self.pop();
                self.push(-a);
            },
            Ceiling => {
                let a = self.pop();
                self.push(a.ceil());
            },
            Floor => {
                let a = self.pop();
                self.push(a.floor());
            },
            Round => {
                let a = self.pop();
                self.push((a + 0.5).floor());
            },
            Truncate | Cvi => {
                let a = self.pop();
                self.push(a.trunc());
            },
            Cvr => {},
            Sqrt => {
                let a = self.pop();
                self.push(a.max(0.0).sqrt());
            },
            Sin => {
                let a = self.pop();
                self.push(a.to_radians().sin());
            },
            Cos => {
                let a = self.pop();
                self.push(a.to_radians().cos());
            },
            Ln => {
                let a = self.pop();
                self.push(a.ln());
            },
            Log => {
                let a = self.pop();
                self.push(a.log10());
            },
            Not => {
                let a = self.pop() as i64;
                self.push(bool_value(a == 0));
            },
            True => self.push(1.0),
            False => self.push(0.0),
            Dup => {
                let a = self.pop();
                self.push(a);
                self.push(a);
            },
            Pop => {
                self.pop();
            },
            Exch => {
                let b = self.pop();
                let a = self.pop();
                self.push(b);
                self.push(a);
            },
            Copy => {
                let n = self.pop() as i64;
                if n > 0 && (n as usize) <= self.stack.len() {
                    let start = self.stack.len() - n as usize;
                    for i in start..start + n as usize {
                        let v = self.stack[i];
                        self.push(v);
                    }
                }
            },
            Index => {
                let n = self.pop() as i64;
                if n >= 0 && (n as usize) < self.stack.len() {
                    let v = self.stack[self.stack.len() - 1 - n as usize];
                    self.push(v);
                } else {
                    self.push(0.0);
                }
            },
            Roll => {
                let j = self.pop() as i64;
                let n = self.pop() as i64;
                if n > 0 && (n as usize) <= self.stack.len() {
                    let start = self.stack.len() - n as usize;
                    let slice = &mut self.stack[start..];
                    let shift = j.rem_euclid(n) as usize;
                    slice.rotate_right(shift);
                }
            },
            _ => {
                let b = self.pop();
                let a = self.pop();
                let v = match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => {
                        if b == 0.0 {
                            0.0
                        } else {
                            a / b
                        }
                    },
                    Idiv => {
                        let (a, b) = (a as i64, b as i64);
                        if b == 0 { 0.0 } else { (a / b) as f64 }
                    },
                    Mod => {
                        let (a, b) = (a as i64, b as i64);
                        if b == 0 { 0.0 } else { (a % b) as f64 }
                    },
                    Atan => {
                        let mut deg = a.atan2(b).to_degrees();
                        if deg < 0.0 {
                            deg += 360.0;
                        }
                        deg
                    },
                    Exp => a.powf(b),
                    And => ((a as i64) & (b as i64)) as f64,
                    Or => ((a as i64) | (b as i64)) as f64,
                    Xor => ((a as i64) ^ (b as i64)) as f64,
                    Bitshift => {
                        let (a, b) = (a as i64, b as i64);
                        if b >= 0 {
                            a.checked_shl(b as u32).unwrap_or(0) as f64
                        } else {
                            a.checked_shr((-b) as u32).unwrap_or(0) as f64
                        }
                    },
                    Eq => bool_value(a == b),
                    Ne => bool_value(a != b),
                    Ge => bool_value(a >= b),
                    Gt => bool_value(a > b),
                    Le => bool_value(a <= b),
                    Lt => bool_value(a < b),
                    _ => 0.0,
                };
                self.push(v);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    fn num_array(values: &[f32]) -> Object {
        Object::Array(values.iter().map(|&v| Object::Real(v as f64)).collect())
    }

    #[test]
    fn test_exponential() {
        let f = Function::exponential(vec![0.0, 0.0, 0.0], vec![1.0, 0.5, 0.0], 1.0);
        assert_eq!(f.evaluate(&[0.5]), vec![0.5, 0.25, 0.0]);
        assert_eq!(f.evaluate(&[2.0]), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_load_stitching() {
        let mut doc = Document::new();
        let mut a = Dict::new();
        a.insert("FunctionType".into(), Object::Integer(2));
        a.insert("Domain".into(), num_array(&[0.0, 1.0]));
        a.insert("C0".into(), num_array(&[0.0]));
        a.insert("C1".into(), num_array(&[1.0]));
        a.insert("N".into(), Object::Integer(1));
        let a = doc.add(Object::Dictionary(a));
        let mut st = Dict::new();
        st.insert("FunctionType".into(), Object::Integer(3));
        st.insert("Domain".into(), num_array(&[0.0, 1.0]));
        st.insert("Functions".into(), Object::Array(vec![Object::Reference(a), Object::Reference(a)]));
        st.insert("Bounds".into(), num_array(&[0.5]));
        st.insert("Encode".into(), num_array(&[0.0, 1.0, 1.0, 0.0]));
        let f = Function::load(&doc, &Object::Dictionary(st)).unwrap();
        assert!((f.evaluate(&[0.25])[0] - 0.5).abs() < 1e-6);
        assert!((f.evaluate(&[0.75])[0] - 0.5).abs() < 1e-6);
        assert!((f.evaluate(&[1.0])[0] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_sampled_interpolation() {
        let mut doc = Document::new();
        let mut dict = Dict::new();
        dict.insert("FunctionType".into(), Object::Integer(0));
        dict.insert("Domain".into(), num_array(&[0.0, 1.0]));
        dict.insert("Range".into(), num_array(&[0.0, 1.0]));
        dict.insert("Size".into(), num_array(&[2.0]));
        dict.insert("BitsPerSample".into(), Object::Integer(8));
        let stream = doc.add(Object::Stream {
            dict,
            data: bytes::Bytes::from_static(&[0, 255]),
        });
        let f = Function::load(&doc, &Object::Reference(stream)).unwrap();
        assert!((f.evaluate(&[0.5])[0] - 0.5).abs() < 1e-3);
        assert_eq!(f.evaluate(&[1.0]), vec![1.0]);
    }

    #[test]
    fn test_postscript_program() {
        let mut doc = Document::new();
        let mut dict = Dict::new();
        dict.insert("FunctionType".into(), Object::Integer(4));
        dict.insert("Domain".into(), num_array(&[0.0, 1.0]));
        dict.insert("Range".into(), num_array(&[0.0, 1.0, 0.0, 1.0]));
        let stream = doc.add(Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"{ dup 0.5 gt { 1 exch sub } { 2 mul } ifelse dup }"),
        });
        let f = Function::load(&doc, &Object::Reference(stream)).unwrap();
        assert_eq!(f.outputs(), 2);
        let out = f.evaluate(&[0.25]);
        assert!((out[0] - 0.5).abs() < 1e-6 && (out[1] - 0.5).abs() < 1e-6);
        let out = f.evaluate(&[0.75]);
        assert!((out[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_postscript_stack_ops() {
        let program = parse_postscript(b"{ 1 2 3 3 1 roll 2 index }").unwrap();
        let mut engine = PsEngine::default();
        engine.execute(&program);
        assert_eq!(engine.stack, vec![3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_function_list() {
        let f = Rc::new(Function::exponential(vec![0.0], vec![1.0], 1.0));
        let out = evaluate_list(&[f.clone(), f], &[0.5]);
        assert_eq!(out, vec![0.5, 0.5]);
    }
}
