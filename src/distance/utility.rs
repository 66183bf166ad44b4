//! Norm computation and in-place L2 normalization.
//!
//! Only float lane types can be normalized losslessly; the kernel factory
//! rejects Normalized* metrics on integer data before these helpers run.

use half::f16;

/// L2 norm of an `f32` slice.
#[must_use]
pub fn l2_norm_f32(v: &[f32]) -> f32 {
    let mut sum = 0.0f64;
    for &x in v {
        sum += f64::from(x) * f64::from(x);
    }
    sum.sqrt() as f32
}

/// L2 norm of an `f16` slice, accumulated in f64.
#[must_use]
pub fn l2_norm_f16(v: &[f16]) -> f32 {
    let mut sum = 0.0f64;
    for &x in v {
        let x = f64::from(x.to_f32());
        sum += x * x;
    }
    sum.sqrt() as f32
}

/// Scales an `f32` slice to unit L2 norm in place. A zero vector is left
/// untouched; normalizing it has no meaningful direction.
pub fn l2_normalize_f32(v: &mut [f32]) {
    let norm = l2_norm_f32(v);
    if norm == 0.0 {
        return;
    }
    for x in v {
        *x /= norm;
    }
}

/// Scales an `f16` slice to unit L2 norm in place.
pub fn l2_normalize_f16(v: &mut [f16]) {
    let norm = l2_norm_f16(v);
    if norm == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x = f16::from_f32(x.to_f32() / norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_of_pythagorean_triple() {
        assert!((l2_norm_f32(&[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = [3.0f32, 0.0, 4.0];
        l2_normalize_f32(&mut v);
        assert!((l2_norm_f32(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut v = [1.0f32, 2.0, 2.0];
        l2_normalize_f32(&mut v);
        let first = v;
        l2_normalize_f32(&mut v);
        for (a, b) in first.iter().zip(v.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_vector_is_left_alone() {
        let mut v = [0.0f32; 4];
        l2_normalize_f32(&mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn f16_normalization() {
        let mut v: Vec<f16> = [3.0f32, 4.0].iter().map(|&x| f16::from_f32(x)).collect();
        l2_normalize_f16(&mut v);
        assert!((l2_norm_f16(&v) - 1.0).abs() < 1e-2);
    }
}
