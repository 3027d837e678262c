use crate::config::Number;
use wide::f32x8;

/// Squared Euclidean distance using SIMD lanes of eight. Callers guarantee
/// equal lengths; extra elements of the longer slice are ignored.
pub fn squared_l2_simd(a: &[Number], b: &[Number]) -> Number {
    let len = a.len().min(b.len());
    let simd_len = len - (len % 8);

    let mut acc = f32x8::splat(0.0);
    for (ca, cb) in a[..simd_len].chunks_exact(8).zip(b[..simd_len].chunks_exact(8)) {
        let va = f32x8::new([ca[0], ca[1], ca[2], ca[3], ca[4], ca[5], ca[6], ca[7]]);
        let vb = f32x8::new([cb[0], cb[1], cb[2], cb[3], cb[4], cb[5], cb[6], cb[7]]);
        let diff = va - vb;
        acc += diff * diff;
    }

    let mut sum = acc.reduce_add();
    for i in simd_len..len {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Scalar reference implementation.
pub fn squared_l2(a: &[Number], b: &[Number]) -> Number {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simd_matches_scalar() {
        for len in [0usize, 3, 8, 13, 64, 770] {
            let a: Vec<Number> = (0..len).map(|i| (i as Number * 0.37).sin()).collect();
            let b: Vec<Number> = (0..len).map(|i| (i as Number * 0.11).cos()).collect();
            let simd = squared_l2_simd(&a, &b);
            let scalar = squared_l2(&a, &b);
            assert!((simd - scalar).abs() <= 1e-3 * scalar.max(1.0), "len {}", len);
        }
    }

    #[test]
    fn test_identical_vectors_have_zero_distance() {
        let v = vec![0.5; 20];
        assert_eq!(squared_l2_simd(&v, &v), 0.0);
    }

    #[test]
    fn test_known_distance() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 2.0, 2.0];
        assert_eq!(squared_l2_simd(&a, &b), 9.0);
    }
}
