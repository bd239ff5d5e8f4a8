use ndarray::Array2;

/// 构造标准差为 `sigma` 的一维高斯核, 截断半宽为 `3 * sigma`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    debug_assert!(sigma > 0.0);
    let radius = (3.0 * sigma).ceil().max(1.0) as usize;
    let inv_2s2 = 1.0 / (2.0 * sigma * sigma);
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    let mut sum = 0.0;
    for i in 0..=(2 * radius) {
        let d = i as f64 - radius as f64;
        let g = (-inv_2s2 * d * d).exp();
        kernel.push(g);
        sum += g;
    }
    for v in kernel.iter_mut() {
        *v /= sum;
    }
    kernel
}

/// 反射边界下取一维序列的第 `i` 个元素, `i` 允许越界.
#[inline]
fn reflect(len: usize, i: i64) -> usize {
    debug_assert!(len >= 1);
    let last = (len - 1) as i64;
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i > last {
        i = 2 * last - i;
    }
    i.clamp(0, last) as usize
}

/// 可分离高斯模糊. `radius` 为标准差, 0 等价于恒等变换.
///
/// 边界按反射规则延拓.
pub(crate) fn gaussian_blur(plane: &Array2<u8>, radius: f64) -> Array2<u8> {
    if radius <= 0.0 {
        return plane.clone();
    }
    let kernel = gaussian_kernel(radius);
    let half = (kernel.len() / 2) as i64;
    let &[h, w] = plane.shape() else {
        unreachable!()
    };

    // 行方向
    let mut tmp = Array2::<f64>::zeros((h, w));
    for i in 0..h {
        for j in 0..w {
            let mut acc = 0.0;
            for (k, &g) in kernel.iter().enumerate() {
                let jj = reflect(w, j as i64 + k as i64 - half);
                acc += plane[(i, jj)] as f64 * g;
            }
            tmp[(i, j)] = acc;
        }
    }

    // 列方向
    let mut ans = Array2::<u8>::zeros((h, w));
    for i in 0..h {
        for j in 0..w {
            let mut acc = 0.0;
            for (k, &g) in kernel.iter().enumerate() {
                let ii = reflect(h, i as i64 + k as i64 - half);
                acc += tmp[(ii, j)] * g;
            }
            ans[(i, j)] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    ans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_radius_is_identity() {
        let plane = Array2::from_shape_fn((5, 5), |(i, j)| (i * 5 + j) as u8);
        assert_eq!(gaussian_blur(&plane, 0.0), plane);
    }

    #[test]
    fn test_constant_plane_unchanged() {
        let plane = Array2::from_elem((8, 8), 131u8);
        assert_eq!(gaussian_blur(&plane, 2.0), plane);
    }

    #[test]
    fn test_blur_spreads_peak() {
        let mut plane = Array2::from_elem((9, 9), 0u8);
        plane[(4, 4)] = 255;
        let blurred = gaussian_blur(&plane, 1.0);
        assert!(blurred[(4, 4)] < 255);
        assert!(blurred[(4, 5)] > 0);
        // 总能量大致守恒 (边界无泄漏).
        let sum: u64 = blurred.iter().map(|&p| p as u64).sum();
        assert!(sum > 200 && sum < 300);
    }
}
