//! Operand buffer for content-stream operators.
//!
//! Operands are pushed as they are read and fetched by reverse index when
//! the operator arrives: index 0 is the most recent operand. The buffer has
//! a fixed capacity and evicts the oldest operand on overflow, so a stream
//! with too many operands in a row loses the earliest ones instead of
//! failing.
//!
//! Numbers and names are stored as their literal value and only promoted to
//! an [`Object`] when an operator asks for one.

use crate::geometry::{Matrix, Point};
use crate::object::Object;

/// Number of operand slots.
pub const OPERAND_CAPACITY: usize = 32;

/// Fixed-capacity circular buffer indexed from the newest element.
///
/// # Examples
///
/// ```
/// use pdf_raster::content::operand_stack::RingBuffer;
///
/// let mut ring: RingBuffer<u32, 2> = RingBuffer::new();
/// ring.push(1);
/// ring.push(2);
/// ring.push(3);
/// assert_eq!(ring.get(0), Some(&3));
/// assert_eq!(ring.get(1), Some(&2));
/// assert_eq!(ring.get(2), None);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    slots: [Option<T>; N],
    start: usize,
    len: usize,
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> RingBuffer<T, N> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            start: 0,
            len: 0,
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.start = 0;
        self.len = 0;
    }

    /// Append an element, evicting the oldest one when full.
    pub fn push(&mut self, value: T) {
        if N == 0 {
            return;
        }
        if self.len == N {
            self.slots[self.start] = Some(value);
            self.start = (self.start + 1) % N;
        } else {
            let index = (self.start + self.len) % N;
            self.slots[index] = Some(value);
            self.len += 1;
        }
    }

    fn physical_index(&self, back: usize) -> Option<usize> {
        if back >= self.len {
            return None;
        }
        Some((self.start + self.len - 1 - back) % N)
    }

    /// Element `back` positions before the newest.
    pub fn get(&self, back: usize) -> Option<&T> {
        self.physical_index(back).and_then(|i| self.slots[i].as_ref())
    }

    /// Mutable access to the element `back` positions before the newest.
    pub fn get_mut(&mut self, back: usize) -> Option<&mut T> {
        self.physical_index(back).and_then(|i| self.slots[i].as_mut())
    }
}

/// One operand slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Number not yet turned into an object
    Number(f32),
    /// Name not yet turned into an object, without the leading `/`
    Name(String),
    /// Any object
    Object(Object),
}

impl Operand {
    fn promote(&mut self) {
        let obj = match self {
            Operand::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i32::MAX as f32 {
                    Object::Integer(*n as i64)
                } else {
                    Object::Real(*n as f64)
                }
            },
            Operand::Name(name) => Object::Name(std::mem::take(name)),
            Operand::Object(_) => return,
        };
        *self = Operand::Object(obj);
    }
}

/// The interpreter's operand buffer.
#[derive(Debug, Clone, Default)]
pub struct OperandStack {
    ring: RingBuffer<Operand, OPERAND_CAPACITY>,
}

impl OperandStack {
    /// Create an empty operand stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operands since the last operator.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True when there are no operands.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Push a number operand.
    pub fn add_number(&mut self, value: f32) {
        self.ring.push(Operand::Number(value));
    }

    /// Push a name operand (without the leading `/`).
    pub fn add_name(&mut self, name: String) {
        self.ring.push(Operand::Name(name));
    }

    /// Push an object operand.
    pub fn add_object(&mut self, obj: Object) {
        self.ring.push(Operand::Object(obj));
    }

    /// Drop all operands.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Raw operand slot.
    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.ring.get(index)
    }

    /// Numeric value of operand `index`, or 0.
    pub fn number(&self, index: usize) -> f32 {
        match self.ring.get(index) {
            Some(Operand::Number(n)) => *n,
            Some(Operand::Object(obj)) => obj.as_number().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Integer value of operand `index`, or 0.
    pub fn integer(&self, index: usize) -> i32 {
        match self.ring.get(index) {
            Some(Operand::Number(n)) => *n as i32,
            Some(Operand::Object(obj)) => obj.as_integer().unwrap_or(0) as i32,
            _ => 0,
        }
    }

    /// Name or string value of operand `index`, or an empty string.
    pub fn string(&self, index: usize) -> String {
        match self.ring.get(index) {
            Some(Operand::Name(name)) => name.clone(),
            Some(Operand::Object(Object::Name(name))) => name.clone(),
            Some(Operand::Object(Object::String(bytes))) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        }
    }

    /// Operand `index` as an object, promoting a literal slot in place.
    pub fn object(&mut self, index: usize) -> Option<&Object> {
        let slot = self.ring.get_mut(index)?;
        slot.promote();
        match slot {
            Operand::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Take ownership of operand `index` as an object.
    pub fn take_object(&mut self, index: usize) -> Option<Object> {
        let slot = self.ring.get_mut(index)?;
        slot.promote();
        match std::mem::replace(slot, Operand::Object(Object::Null)) {
            Operand::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// True when operand `index` is numeric.
    pub fn is_number(&self, index: usize) -> bool {
        match self.ring.get(index) {
            Some(Operand::Number(_)) => true,
            Some(Operand::Object(obj)) => obj.is_number(),
            _ => false,
        }
    }

    /// All operands as numbers, oldest first.
    pub fn numbers(&self, count: usize) -> Vec<f32> {
        (0..count.min(self.len())).rev().map(|i| self.number(i)).collect()
    }

    /// Point made of operands `index + 1` (x) and `index` (y).
    pub fn point(&self, index: usize) -> Point {
        Point::new(self.number(index + 1), self.number(index))
    }

    /// Matrix made of the last six operands.
    pub fn matrix(&self) -> Matrix {
        Matrix::new(
            self.number(5),
            self.number(4),
            self.number(3),
            self.number(2),
            self.number(1),
            self.number(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reverse_index() {
        let mut stack = OperandStack::new();
        stack.add_number(1.0);
        stack.add_name("F1".to_string());
        stack.add_object(Object::String(b"abc".to_vec()));
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.string(0), "abc");
        assert_eq!(stack.string(1), "F1");
        assert_eq!(stack.number(2), 1.0);
    }

    #[test]
    fn test_out_of_range_defaults() {
        let mut stack = OperandStack::new();
        assert_eq!(stack.number(0), 0.0);
        assert_eq!(stack.integer(4), 0);
        assert_eq!(stack.string(1), "");
        assert!(stack.object(0).is_none());
    }

    #[test]
    fn test_lazy_promotion_is_memoized() {
        let mut stack = OperandStack::new();
        stack.add_number(3.0);
        stack.add_name("Pattern".to_string());
        assert_eq!(stack.object(0), Some(&Object::Name("Pattern".to_string())));
        assert_eq!(stack.operand(0), Some(&Operand::Object(Object::Name("Pattern".to_string()))));
        assert_eq!(stack.object(1), Some(&Object::Integer(3)));
        assert_eq!(stack.number(1), 3.0);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut stack = OperandStack::new();
        for i in 0..40 {
            stack.add_number(i as f32);
        }
        assert_eq!(stack.len(), OPERAND_CAPACITY);
        assert_eq!(stack.number(0), 39.0);
        assert_eq!(stack.number(OPERAND_CAPACITY - 1), 8.0);
        assert_eq!(stack.number(OPERAND_CAPACITY), 0.0);
    }

    #[test]
    fn test_matrix_and_point() {
        let mut stack = OperandStack::new();
        for v in [2.0, 0.0, 0.0, 3.0, 10.0, 20.0] {
            stack.add_number(v);
        }
        assert_eq!(stack.matrix(), Matrix::new(2.0, 0.0, 0.0, 3.0, 10.0, 20.0));
        assert_eq!(stack.point(0), Point::new(10.0, 20.0));
        assert_eq!(stack.numbers(3), vec![3.0, 10.0, 20.0]);
    }

    #[test]
    fn test_clear() {
        let mut stack = OperandStack::new();
        stack.add_number(1.0);
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.number(0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_newest_is_index_zero(values in proptest::collection::vec(-1000i32..1000, 1..100)) {
            let mut stack = OperandStack::new();
            for v in &values {
                stack.add_number(*v as f32);
            }
            let kept = values.len().min(OPERAND_CAPACITY);
            prop_assert_eq!(stack.len(), kept);
            for back in 0..kept {
                prop_assert_eq!(stack.number(back), values[values.len() - 1 - back] as f32);
            }
            prop_assert_eq!(stack.number(kept), 0.0);
        }
    }
}
