//! 欧氏距离变换.

use crate::data::Mask;
use ndarray::Array2;

/// 远大于任何真实平方距离的有限哨兵 (避免 inf 参与抛物线求交).
const FAR: f64 = 1e20;

/// 一维平方距离变换 (下包络抛物线法).
///
/// `f` 为初始代价, 返回 `d[q] = min_p ((q - p)^2 + f[p])`.
fn dt1d(f: &[f64]) -> Vec<f64> {
    let n = f.len();
    debug_assert!(n >= 1);
    let mut d = vec![0.0f64; n];

    // v: 包络中各抛物线的顶点; z: 相邻抛物线的分界点.
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    for q in 1..n {
        loop {
            let p = v[k];
            let s = ((f[q] + (q * q) as f64) - (f[p] + (p * p) as f64))
                / (2 * q - 2 * p) as f64;
            if s <= z[k] {
                debug_assert!(k >= 1);
                k -= 1;
            } else {
                k += 1;
                v[k] = q;
                z[k] = s;
                z[k + 1] = f64::INFINITY;
                break;
            }
        }
    }

    let mut k = 0usize;
    for (q, slot) in d.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let p = v[k];
        let dq = q.abs_diff(p) as f64;
        *slot = dq * dq + f[p];
    }
    d
}

/// 计算掩膜的欧氏距离变换: 每个前景像素到最近背景像素的欧氏距离.
///
/// 背景像素的距离为 0. 全前景掩膜返回一致的大哨兵距离 (不存在背景).
/// 算法为可分离的精确平方距离变换, 先列后行, 最后开方.
pub fn distance_transform(mask: &Mask) -> Array2<f64> {
    let (h, w) = mask.shape();
    let mut sq = Array2::<f64>::zeros((h, w));
    if h == 0 || w == 0 {
        return sq;
    }

    // 初始代价: 背景 0, 前景 FAR.
    for (pos, &pix) in mask.indexed_iter() {
        sq[pos] = if pix { FAR } else { 0.0 };
    }

    // 沿列方向.
    for j in 0..w {
        let col: Vec<f64> = (0..h).map(|i| sq[(i, j)]).collect();
        for (i, val) in dt1d(&col).into_iter().enumerate() {
            sq[(i, j)] = val;
        }
    }

    // 沿行方向.
    for i in 0..h {
        let row: Vec<f64> = (0..w).map(|j| sq[(i, j)]).collect();
        for (j, val) in dt1d(&row).into_iter().enumerate() {
            sq[(i, j)] = val;
        }
    }

    sq.mapv_into(f64::sqrt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_background_is_zero() {
        let m = Mask::filled((5, 5), false);
        let d = distance_transform(&m);
        assert!(d.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_single_foreground_pixel() {
        let mut m = Mask::filled((5, 5), false);
        m[(2, 2)] = true;
        let d = distance_transform(&m);
        assert_eq!(d[(2, 2)], 1.0);
        assert_eq!(d[(0, 0)], 0.0);
    }

    #[test]
    fn test_band_distance_grows_to_center() {
        // 前景为第 2..8 行的水平条带, 距离只与行号有关.
        let m = Mask::new(Array2::from_shape_fn((10, 20), |(i, _)| (2..8).contains(&i)));
        let d = distance_transform(&m);
        for j in 0..20 {
            assert_eq!(d[(2, j)], 1.0);
            assert_eq!(d[(4, j)], 3.0);
            assert_eq!(d[(7, j)], 1.0);
            assert_eq!(d[(0, j)], 0.0);
        }
    }

    #[test]
    fn test_diagonal_is_euclidean() {
        // 3×3 实心块中心到最近背景的距离是精确欧氏值 2.
        let mut m = Mask::filled((7, 7), false);
        for i in 2..5 {
            for j in 2..5 {
                m[(i, j)] = true;
            }
        }
        let d = distance_transform(&m);
        assert_eq!(d[(3, 3)], 2.0);
        assert_eq!(d[(2, 2)], 1.0);
        assert!((d[(3, 2)] - 1.0).abs() < 1e-12);
    }
}
