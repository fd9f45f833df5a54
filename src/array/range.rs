use super::ArrayAccess;

/// Range of one component of `array`.
///
/// * `component >= 0`: min/max of that component
/// * `-1`: min/max of the L1 norm of the tuples
/// * `-2`: range of the L2 norm, always widened to include the origin
///
/// NaN values are skipped. Returns `None` for an invalid component, an empty array or
/// an array whose values are all NaN.
pub fn compute_range<A: ArrayAccess + ?Sized>(array: &A, component: i32) -> Option<[f64; 2]> {
    let nc = array.number_of_components();
    let nt = array.number_of_tuples();
    if component < -2 || (component >= 0 && component as usize >= nc) || nt == 0 || nc == 0 {
        return None;
    }

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;

    for t in 0..nt {
        let value = match component {
            -2 => {
                let mut sum = 0.0;
                for c in 0..nc {
                    let v = array.component(t, c);
                    sum += v * v;
                }
                sum.sqrt()
            }
            -1 => (0..nc).map(|c| array.component(t, c).abs()).sum(),
            c => array.component(t, c as usize),
        };

        if value.is_nan() {
            continue;
        }
        lo = lo.min(value);
        hi = hi.max(value);
    }

    if lo > hi {
        return None;
    }

    if component == -2 {
        lo = 0.0;
    }

    Some([lo, hi])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::DataArray;

    #[test]
    fn component_and_norm_ranges() {
        let a = DataArray::from_tuples("v", vec![[1.0f32, -2.0], [3.0, 4.0], [f32::NAN, 0.5]]);
        assert_eq!(compute_range(&a, 0), Some([1.0, 3.0]));
        assert_eq!(compute_range(&a, 1), Some([-2.0, 4.0]));
        assert_eq!(compute_range(&a, -1), Some([3.0, 7.0]));
        assert_eq!(compute_range(&a, -2), Some([0.0, 5.0]));
        assert_eq!(compute_range(&a, 2), None);
        assert_eq!(compute_range(&a, -3), None);
    }

    #[test]
    fn empty_and_all_nan() {
        let empty = DataArray::new(crate::array::ScalarType::Double, 1);
        assert_eq!(compute_range(&empty, 0), None);

        let nan = DataArray::from_vec("n", 1, vec![f64::NAN, f64::NAN]).unwrap();
        assert_eq!(compute_range(&nan, 0), None);
    }
}
