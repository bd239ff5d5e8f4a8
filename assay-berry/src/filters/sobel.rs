use ndarray::Array2;

/// 反射边界下的像素读取.
#[inline]
fn at(plane: &Array2<u8>, h: usize, w: usize, di: i64, dj: i64) -> f64 {
    let &[hh, ww] = plane.shape() else {
        unreachable!()
    };
    let clamp = |len: usize, i: i64| -> usize {
        let last = (len - 1) as i64;
        let mut i = i;
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
        i.clamp(0, last) as usize
    };
    let i = clamp(hh, h as i64 + di);
    let j = clamp(ww, w as i64 + dj);
    plane[(i, j)] as f64 / 255.0
}

/// Sobel 梯度幅值 (边缘响应).
///
/// 像素先被规范化到 \[0, 1\], 两个方向的导数核均以 1/4 归一,
/// 幅值再除以 `sqrt(2)`, 因此输出落在 \[0, 1\] 浮点域内.
pub(crate) fn sobel_magnitude(plane: &Array2<u8>) -> Array2<f64> {
    let &[h, w] = plane.shape() else {
        unreachable!()
    };
    let mut ans = Array2::<f64>::zeros((h, w));
    if h == 0 || w == 0 {
        return ans;
    }
    for i in 0..h {
        for j in 0..w {
            let p = |di: i64, dj: i64| at(plane, i, j, di, dj);

            let gx = ((p(-1, -1) + 2.0 * p(0, -1) + p(1, -1))
                - (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)))
                / 4.0;
            let gy = ((p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1))
                - (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)))
                / 4.0;
            ans[(i, j)] = (gx * gx + gy * gy).sqrt() / std::f64::consts::SQRT_2;
        }
    }
    ans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_plane_has_zero_response() {
        let plane = Array2::from_elem((6, 6), 200u8);
        let mag = sobel_magnitude(&plane);
        assert!(mag.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vertical_step_peaks_at_boundary() {
        // 左黑右白, 竖直边界位于第 4/5 列之间.
        let plane = Array2::from_shape_fn((8, 8), |(_, j)| if j < 4 { 0u8 } else { 255 });
        let mag = sobel_magnitude(&plane);
        // 响应支撑落在边界两侧各一列内, 其余位置为零.
        for i in 0..8 {
            assert!(mag[(i, 3)] > 0.0);
            assert!(mag[(i, 4)] > 0.0);
            assert_eq!(mag[(i, 1)], 0.0);
            assert_eq!(mag[(i, 6)], 0.0);
        }
        assert!(mag.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
