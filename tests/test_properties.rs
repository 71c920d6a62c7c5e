//! Property tests for the operand ring buffer and matrix arithmetic.

use pdf_raster::content::operand_stack::RingBuffer;
use pdf_raster::geometry::Matrix;
use proptest::prelude::*;

const CAPACITY: usize = 16;

fn invertible_matrix() -> impl Strategy<Value = Matrix> {
    (
        -10.0f32..10.0,
        -10.0f32..10.0,
        -10.0f32..10.0,
        -10.0f32..10.0,
        -100.0f32..100.0,
        -100.0f32..100.0,
    )
        .prop_map(|(a, b, c, d, e, f)| Matrix::new(a, b, c, d, e, f))
        .prop_filter("determinant away from zero", |m| m.determinant().abs() > 0.1)
}

fn any_matrix() -> impl Strategy<Value = Matrix> {
    (
        -4.0f32..4.0,
        -4.0f32..4.0,
        -4.0f32..4.0,
        -4.0f32..4.0,
        -50.0f32..50.0,
        -50.0f32..50.0,
    )
        .prop_map(|(a, b, c, d, e, f)| Matrix::new(a, b, c, d, e, f))
}

fn approx(a: &Matrix, b: &Matrix, eps: f32) -> bool {
    let pairs = [(a.a, b.a), (a.b, b.b), (a.c, b.c), (a.d, b.d), (a.e, b.e), (a.f, b.f)];
    pairs.iter().all(|(x, y)| (x - y).abs() <= eps * (1.0 + x.abs().max(y.abs())))
}

proptest! {
    #[test]
    fn prop_ring_buffer_keeps_newest(values in prop::collection::vec(any::<u32>(), 0..64)) {
        let mut ring: RingBuffer<u32, CAPACITY> = RingBuffer::new();
        for v in &values {
            ring.push(*v);
        }
        let kept = values.len().min(CAPACITY);
        prop_assert_eq!(ring.len(), kept);
        for back in 0..kept {
            prop_assert_eq!(ring.get(back), Some(&values[values.len() - 1 - back]));
        }
        prop_assert_eq!(ring.get(kept), None);
    }

    #[test]
    fn prop_ring_buffer_clear_resets(values in prop::collection::vec(any::<u32>(), 1..40), next in any::<u32>()) {
        let mut ring: RingBuffer<u32, CAPACITY> = RingBuffer::new();
        for v in &values {
            ring.push(*v);
        }
        ring.clear();
        prop_assert!(ring.is_empty());
        ring.push(next);
        prop_assert_eq!(ring.get(0), Some(&next));
        prop_assert_eq!(ring.get(1), None);
    }

    #[test]
    fn prop_inverse_round_trips(m in invertible_matrix(), x in -100.0f32..100.0, y in -100.0f32..100.0) {
        let p = m.transform_point(x, y);
        let back = m.inverse().transform_point(p.x, p.y);
        let tolerance = 1e-2 * (1.0 + x.abs().max(y.abs()));
        prop_assert!((back.x - x).abs() <= tolerance, "x: {} vs {}", back.x, x);
        prop_assert!((back.y - y).abs() <= tolerance, "y: {} vs {}", back.y, y);
    }

    #[test]
    fn prop_multiply_is_associative(a in any_matrix(), b in any_matrix(), c in any_matrix()) {
        let left = a.multiply(&b).multiply(&c);
        let right = a.multiply(&b.multiply(&c));
        prop_assert!(approx(&left, &right, 1e-3), "{:?} vs {:?}", left, right);
    }

    #[test]
    fn prop_multiply_applies_left_first(a in any_matrix(), b in any_matrix(), x in -10.0f32..10.0, y in -10.0f32..10.0) {
        let combined = a.multiply(&b).transform_point(x, y);
        let first = a.transform_point(x, y);
        let stepwise = b.transform_point(first.x, first.y);
        let tolerance = 1e-2 * (1.0 + stepwise.x.abs().max(stepwise.y.abs()));
        prop_assert!((combined.x - stepwise.x).abs() <= tolerance);
        prop_assert!((combined.y - stepwise.y).abs() <= tolerance);
    }

    #[test]
    fn prop_identity_is_neutral(m in any_matrix()) {
        prop_assert_eq!(m.multiply(&Matrix::identity()), m);
        prop_assert_eq!(Matrix::identity().multiply(&m), m);
    }
}

#[test]
fn test_singular_inverse_is_identity() {
    let singular = Matrix::new(1.0, 2.0, 2.0, 4.0, 5.0, 6.0);
    assert!(singular.inverse().is_identity());
}
