//! 阈值选择.
//!
//! 从平面的灰度分布计算标量阈值 (Mean / Otsu / Minimum),
//! 然后按平面数值域换算并叠加百分比偏移.

use crate::data::{Histogram, PixelDomain, Plane};
use crate::error::ConfigError;
use std::str::FromStr;

/// 浮点平面的直方图 bin 数.
const NBINS: usize = 256;

/// Minimum 方法直方图平滑的最大迭代次数.
const MAX_SMOOTH_ITERS: usize = 10_000;

/// 统计阈值方法.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThresholdMethod {
    /// 全图灰度均值.
    Mean,

    /// Otsu 类间方差最大化阈值.
    Otsu,

    /// 双峰之间的最小值阈值.
    Minimum,
}

impl ThresholdMethod {
    /// 方法的展示名.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdMethod::Mean => "Mean",
            ThresholdMethod::Otsu => "Otsu",
            ThresholdMethod::Minimum => "Minimum",
        }
    }
}

impl FromStr for ThresholdMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mean" => Ok(ThresholdMethod::Mean),
            "Otsu" => Ok(ThresholdMethod::Otsu),
            "Minimum" => Ok(ThresholdMethod::Minimum),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

/// 计算平面的阈值.
///
/// 偏移按平面数值域换算, 两条分支在语义上不可合并:
///
/// - 布尔 / \[0, 1\] 浮点域: 直接加 `offset_percent / 100`;
/// - B 位无符号整数域: 加 `round(offset_percent × 2^B / 100)` (整数).
///
/// 其余数值域在类型层面不可构造 (见 [`Plane`]), 不会到达这里.
pub fn threshold_of(plane: &Plane, method: ThresholdMethod, offset_percent: f64) -> f64 {
    let base = match method {
        ThresholdMethod::Mean => mean(plane),
        ThresholdMethod::Otsu => otsu(&plane.histogram(NBINS)),
        ThresholdMethod::Minimum => minimum(&plane.histogram(NBINS)),
    };

    let offset = match plane.domain() {
        PixelDomain::Bool | PixelDomain::Float01 => offset_percent / 100.0,
        PixelDomain::Unsigned(bits) => {
            (offset_percent * (1u64 << bits) as f64 / 100.0).round()
        }
    };
    base + offset
}

/// 全图均值.
fn mean(plane: &Plane) -> f64 {
    let n = plane.size();
    if n == 0 {
        log::warn!("对空平面求均值阈值, 返回 0");
        return 0.0;
    }
    plane.iter_f64().sum::<f64>() / n as f64
}

/// Otsu 类间方差最大化.
fn otsu(hist: &Histogram) -> f64 {
    let total: u64 = hist.counts.iter().sum();
    if total == 0 || hist.centers.len() <= 1 {
        return hist.centers.first().copied().unwrap_or(0.0);
    }

    // 只有一种灰度值时不存在类间划分, 直接返回该值 (与均值阈值一致).
    let first_bin = hist.counts.iter().position(|&c| c > 0).unwrap();
    let last_bin = hist.counts.iter().rposition(|&c| c > 0).unwrap();
    if first_bin == last_bin {
        return hist.centers[first_bin];
    }

    let weighted_total: f64 = hist
        .counts
        .iter()
        .zip(hist.centers.iter())
        .map(|(&c, &v)| c as f64 * v)
        .sum();

    let mut best = (0usize, f64::MIN);
    let mut w0 = 0.0f64;
    let mut sum0 = 0.0f64;
    for (i, (&c, &v)) in hist.counts.iter().zip(hist.centers.iter()).enumerate() {
        w0 += c as f64;
        sum0 += c as f64 * v;
        let w1 = total as f64 - w0;
        if w0 == 0.0 || w1 == 0.0 {
            continue;
        }
        let mu0 = sum0 / w0;
        let mu1 = (weighted_total - sum0) / w1;
        let variance = w0 * w1 * (mu0 - mu1) * (mu0 - mu1);
        if variance > best.1 {
            best = (i, variance);
        }
    }
    hist.centers[best.0]
}

/// 对直方图做一轮窗口为 3 的滑动平均平滑 (端点按零延拓).
fn smooth_once(counts: &[f64]) -> Vec<f64> {
    let n = counts.len();
    (0..n)
        .map(|i| {
            let l = if i > 0 { counts[i - 1] } else { 0.0 };
            let r = if i + 1 < n { counts[i + 1] } else { 0.0 };
            (l + counts[i] + r) / 3.0
        })
        .collect()
}

/// 寻找直方图的所有局部极大 bin. 平台只计一次 (取平台起点).
fn local_maxima(counts: &[f64]) -> Vec<usize> {
    let n = counts.len();
    let mut ans = Vec::with_capacity(2);

    // 左侧最近的相异值是否更小 (或不存在).
    let mut left_ok = vec![false; n];
    let mut last_diff = f64::NEG_INFINITY;
    for i in 0..n {
        if i > 0 && counts[i - 1] != counts[i] {
            last_diff = counts[i - 1];
        }
        left_ok[i] = last_diff == f64::NEG_INFINITY || last_diff < counts[i];
    }

    // 右侧对称.
    let mut right_ok = vec![false; n];
    let mut last_diff = f64::NEG_INFINITY;
    for i in (0..n).rev() {
        if i + 1 < n && counts[i + 1] != counts[i] {
            last_diff = counts[i + 1];
        }
        right_ok[i] = last_diff == f64::NEG_INFINITY || last_diff < counts[i];
    }

    for i in 0..n {
        let plateau_start = i == 0 || counts[i - 1] != counts[i];
        if plateau_start && left_ok[i] && right_ok[i] && counts[i] > 0.0 {
            ans.push(i);
        }
    }
    ans
}

/// 双峰之间的最小值阈值.
///
/// 直方图被反复平滑, 直到局部极大值不超过两个. 若最终只剩一个峰
/// (如常数平面), 则直接返回该峰的中心并记录警告, 而不报错.
fn minimum(hist: &Histogram) -> f64 {
    if hist.centers.is_empty() {
        log::warn!("对空平面求 Minimum 阈值, 返回 0");
        return 0.0;
    }
    if hist.centers.len() == 1 {
        return hist.centers[0];
    }

    let mut counts = hist.counts.iter().map(|&c| c as f64).collect::<Vec<_>>();
    let mut maxima = local_maxima(&counts);
    let mut iters = 0usize;
    while maxima.len() > 2 && iters < MAX_SMOOTH_ITERS {
        counts = smooth_once(&counts);
        maxima = local_maxima(&counts);
        iters += 1;
    }

    match maxima.as_slice() {
        [lo, hi] => {
            // 两峰之间计数最小的 bin.
            let between = (*lo + 1)..*hi;
            let min_bin = between
                .min_by(|&a, &b| counts[a].total_cmp(&counts[b]))
                .unwrap_or(*lo);
            hist.centers[min_bin]
        }
        [only] => {
            log::warn!("直方图只有单峰, Minimum 阈值退化为峰位置");
            hist.centers[*only]
        }
        _ => {
            log::warn!("直方图无法收敛到双峰, Minimum 阈值退化为均值");
            let total: f64 = counts.iter().sum();
            let weighted: f64 = counts
                .iter()
                .zip(hist.centers.iter())
                .map(|(&c, &v)| c * v)
                .sum();
            if total > 0.0 {
                weighted / total
            } else {
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn bimodal_u8() -> Plane {
        Plane::U8(Array2::from_shape_fn((16, 16), |(i, _)| {
            if i < 8 {
                10u8
            } else {
                200
            }
        }))
    }

    #[test]
    fn test_unsigned_offset_is_scaled_by_bit_depth() {
        let plane = bimodal_u8();
        for method in [
            ThresholdMethod::Mean,
            ThresholdMethod::Otsu,
            ThresholdMethod::Minimum,
        ] {
            let base = threshold_of(&plane, method, 0.0);
            for offset in [-50.0, -12.5, 0.5, 10.0, 50.0] {
                let expect = base + (offset * 256.0f64 / 100.0).round();
                assert_eq!(threshold_of(&plane, method, offset), expect);
            }
        }
    }

    #[test]
    fn test_float_offset_is_direct_fraction() {
        let plane = Plane::F64(Array2::from_shape_fn((8, 8), |(i, j)| {
            ((i + j) % 5) as f64 / 5.0
        }));
        for method in [ThresholdMethod::Mean, ThresholdMethod::Otsu] {
            let base = threshold_of(&plane, method, 0.0);
            let shifted = threshold_of(&plane, method, 25.0);
            assert!((shifted - base - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_uniform_plane_all_methods_agree() {
        let plane = Plane::U8(Array2::from_elem((100, 100), 128u8));
        let mean = threshold_of(&plane, ThresholdMethod::Mean, 0.0);
        let otsu = threshold_of(&plane, ThresholdMethod::Otsu, 0.0);
        let minimum = threshold_of(&plane, ThresholdMethod::Minimum, 0.0);
        assert_eq!(mean, 128.0);
        assert_eq!(otsu, 128.0);
        assert_eq!(minimum, 128.0);
    }

    #[test]
    fn test_otsu_separates_bimodal_clusters() {
        let t = threshold_of(&bimodal_u8(), ThresholdMethod::Otsu, 0.0);
        assert!(t >= 10.0 && t < 200.0, "阈值越界: {t}");
    }

    #[test]
    fn test_minimum_lies_between_peaks() {
        let t = threshold_of(&bimodal_u8(), ThresholdMethod::Minimum, 0.0);
        assert!(t > 10.0 && t < 200.0, "阈值越界: {t}");
    }

    #[test]
    fn test_unknown_method_name_is_config_error() {
        assert_eq!(
            "Median".parse::<ThresholdMethod>(),
            Err(ConfigError::UnknownMethod("Median".to_string()))
        );
        assert_eq!("Otsu".parse::<ThresholdMethod>(), Ok(ThresholdMethod::Otsu));
    }
}
