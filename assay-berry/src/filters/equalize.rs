use ndarray::Array2;

/// 对比度受限的直方图裁剪: 超出 `clip` 的计数被均匀重新分配到所有 bin.
fn clip_histogram(hist: &mut [f64], clip: f64) {
    let mut excess = 0.0;
    for c in hist.iter_mut() {
        if *c > clip {
            excess += *c - clip;
            *c = clip;
        }
    }
    let share = excess / hist.len() as f64;
    for c in hist.iter_mut() {
        *c += share;
    }
}

/// 单个 tile 的查找表: 裁剪后直方图的累积分布, 缩放到 \[0, 255\].
fn tile_lut(counts: &[f64], area: f64) -> [f64; 256] {
    debug_assert_eq!(counts.len(), 256);
    let mut lut = [0.0f64; 256];
    let mut cdf = 0.0;
    for (v, &c) in counts.iter().enumerate() {
        cdf += c;
        lut[v] = (cdf / area * 255.0).min(255.0);
    }
    lut
}

/// 自适应直方图均衡 (CLAHE).
///
/// 图像被划分为约 8 × 8 个 tile, 每个 tile 拥有各自对比度受限的均衡查找表,
/// 像素值在四个相邻 tile 的查找表之间做双线性插值.
/// 结果重新缩放回 8-bit 整数域.
pub(crate) fn equalize_adapthist(plane: &Array2<u8>, clip_limit: f64) -> Array2<u8> {
    let &[h, w] = plane.shape() else {
        unreachable!()
    };
    if h == 0 || w == 0 {
        return plane.clone();
    }

    // tile 尺寸: 每个方向约 8 份, 至少 1 像素.
    let th = usize::max(h / 8, 1);
    let tw = usize::max(w / 8, 1);
    let nth = (h + th - 1) / th;
    let ntw = (w + tw - 1) / tw;

    // 每个 tile 的查找表.
    let mut luts = Vec::with_capacity(nth * ntw);
    for ti in 0..nth {
        for tj in 0..ntw {
            let h0 = ti * th;
            let h1 = usize::min(h0 + th, h);
            let w0 = tj * tw;
            let w1 = usize::min(w0 + tw, w);

            let mut counts = [0.0f64; 256];
            for i in h0..h1 {
                for j in w0..w1 {
                    counts[plane[(i, j)] as usize] += 1.0;
                }
            }
            let area = ((h1 - h0) * (w1 - w0)) as f64;
            let clip = f64::max(clip_limit * area, 1.0);
            clip_histogram(&mut counts, clip);
            luts.push(tile_lut(&counts, area));
        }
    }
    let lut_at = |ti: usize, tj: usize| &luts[ti * ntw + tj];

    // 双线性插值.
    let mut ans = Array2::<u8>::zeros((h, w));
    for i in 0..h {
        // tile 中心坐标系下的位置.
        let fy = (i as f64 - th as f64 / 2.0) / th as f64;
        let t0 = fy.floor().max(0.0) as usize;
        let ty = (fy - fy.floor()).clamp(0.0, 1.0);
        let (t0, t1, ty) = if fy < 0.0 {
            (0, 0, 0.0)
        } else {
            (t0.min(nth - 1), (t0 + 1).min(nth - 1), ty)
        };

        for j in 0..w {
            let fx = (j as f64 - tw as f64 / 2.0) / tw as f64;
            let s0 = fx.floor().max(0.0) as usize;
            let tx = (fx - fx.floor()).clamp(0.0, 1.0);
            let (s0, s1, tx) = if fx < 0.0 {
                (0, 0, 0.0)
            } else {
                (s0.min(ntw - 1), (s0 + 1).min(ntw - 1), tx)
            };

            let v = plane[(i, j)] as usize;
            let top = lut_at(t0, s0)[v] * (1.0 - tx) + lut_at(t0, s1)[v] * tx;
            let bottom = lut_at(t1, s0)[v] * (1.0 - tx) + lut_at(t1, s1)[v] * tx;
            let out = top * (1.0 - ty) + bottom * ty;
            ans[(i, j)] = out.round().clamp(0.0, 255.0) as u8;
        }
    }
    ans
}
