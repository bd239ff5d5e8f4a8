use crate::Idx2d;
use either::Either;
use itertools::Itertools;
use ndarray::{Array2, ArrayView2};

/// 像素数值域.
///
/// 数值域决定阈值偏移的换算分支 (见 `crate::threshold`):
/// 布尔与 \[0, 1\] 浮点域直接加 `offset / 100`,
/// B 位无符号整数域加 `round(offset × 2^B / 100)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelDomain {
    /// 布尔域 (掩膜).
    Bool,

    /// \[0, 1\] 浮点域 (如边缘响应).
    Float01,

    /// B 位无符号整数域. 参数为位深 B.
    Unsigned(u8),
}

impl PixelDomain {
    /// 数值域是否为整数域.
    #[inline]
    pub fn is_integral(&self) -> bool {
        matches!(self, PixelDomain::Unsigned(_))
    }
}

/// 单通道二维平面.
///
/// 平面只有两种存储形式: 8-bit 无符号整数 (校正后的图像本体)
/// 与 \[0, 1\] 双精度浮点 (边缘响应等派生信号).
/// 其它数值域在类型层面不可构造, 因此不会到达阈值选择阶段.
#[derive(Clone, Debug)]
pub enum Plane {
    /// 8-bit 无符号整数平面.
    U8(Array2<u8>),

    /// \[0, 1\] 浮点平面.
    F64(Array2<f64>),
}

/// 平面的直方图. `counts[i]` 是落入第 `i` 个 bin 的像素个数,
/// `centers[i]` 是该 bin 的中心值.
#[derive(Clone, Debug)]
pub struct Histogram {
    /// 各 bin 的像素个数.
    pub counts: Vec<u64>,

    /// 各 bin 的中心值.
    pub centers: Vec<f64>,
}

impl Plane {
    /// 平面的数值域.
    #[inline]
    pub fn domain(&self) -> PixelDomain {
        match self {
            Plane::U8(_) => PixelDomain::Unsigned(8),
            Plane::F64(_) => PixelDomain::Float01,
        }
    }

    /// 平面的分辨率 (高, 宽).
    pub fn shape(&self) -> Idx2d {
        let sh = match self {
            Plane::U8(a) => a.shape(),
            Plane::F64(a) => a.shape(),
        };
        let &[h, w] = sh else { unreachable!() };
        (h, w)
    }

    /// 平面的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 平面的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 平面的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 获取给定位置 (高, 宽) 的像素值, 统一提升为 `f64`. 越界时 panic.
    #[inline]
    pub fn value_at(&self, pos: Idx2d) -> f64 {
        match self {
            Plane::U8(a) => a[pos] as f64,
            Plane::F64(a) => a[pos],
        }
    }

    /// 获取能以 `f64` 统一迭代所有像素值的迭代器.
    pub fn iter_f64(&self) -> impl Iterator<Item = f64> + '_ {
        match self {
            Plane::U8(a) => Either::Left(a.iter().map(|&p| p as f64)),
            Plane::F64(a) => Either::Right(a.iter().copied()),
        }
    }

    /// 提取第 `h` 行的横截面信号. 越界时 panic.
    pub fn row(&self, h: usize) -> Vec<f64> {
        match self {
            Plane::U8(a) => a.row(h).iter().map(|&p| p as f64).collect(),
            Plane::F64(a) => a.row(h).to_vec(),
        }
    }

    /// 平面的最小/最大像素值. 空平面返回 `None`.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        use itertools::MinMaxResult;

        match self.iter_f64().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(v) => Some((v, v)),
            MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
        }
    }

    /// 计算平面的直方图.
    ///
    /// 整数平面固定使用 256 个 bin, bin 中心即像素值本身;
    /// 浮点平面在 \[min, max\] 之间均分 `nbins` 个 bin.
    /// 常数平面退化为单 bin 直方图.
    pub fn histogram(&self, nbins: usize) -> Histogram {
        match self {
            Plane::U8(a) => {
                let mut counts = vec![0u64; 256];
                for &p in a.iter() {
                    counts[p as usize] += 1;
                }
                Histogram {
                    counts,
                    centers: (0u16..256).map(|v| v as f64).collect(),
                }
            }
            Plane::F64(_) => {
                debug_assert!(nbins >= 1);
                let Some((min, max)) = self.min_max() else {
                    return Histogram {
                        counts: vec![],
                        centers: vec![],
                    };
                };
                if max <= min {
                    return Histogram {
                        counts: vec![self.size() as u64],
                        centers: vec![min],
                    };
                }
                let width = (max - min) / nbins as f64;
                let mut counts = vec![0u64; nbins];
                for v in self.iter_f64() {
                    let mut bin = ((v - min) / width) as usize;
                    if bin >= nbins {
                        bin = nbins - 1;
                    }
                    counts[bin] += 1;
                }
                let centers = (0..nbins)
                    .map(|i| min + (i as f64 + 0.5) * width)
                    .collect();
                Histogram { counts, centers }
            }
        }
    }

    /// 获得 `u8` 存储的不可变视图. 浮点平面返回 `None`.
    #[inline]
    pub fn as_u8(&self) -> Option<ArrayView2<u8>> {
        match self {
            Plane::U8(a) => Some(a.view()),
            Plane::F64(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_u8_histogram_exact_bins() {
        let p = Plane::U8(array![[0u8, 0, 1], [255, 1, 1]]);
        let h = p.histogram(64);
        assert_eq!(h.counts.len(), 256);
        assert_eq!(h.counts[0], 2);
        assert_eq!(h.counts[1], 3);
        assert_eq!(h.counts[255], 1);
        assert_eq!(h.centers[255], 255.0);
    }

    #[test]
    fn test_constant_float_histogram_single_bin() {
        let p = Plane::F64(Array2::from_elem((4, 4), 0.25));
        let h = p.histogram(128);
        assert_eq!(h.counts, vec![16]);
        assert_eq!(h.centers, vec![0.25]);
    }

    #[test]
    fn test_row_and_minmax() {
        let p = Plane::F64(array![[0.0, 0.5], [1.0, 0.5]]);
        assert_eq!(p.row(1), vec![1.0, 0.5]);
        assert_eq!(p.min_max(), Some((0.0, 1.0)));
        assert_eq!(p.domain(), PixelDomain::Float01);
    }
}
