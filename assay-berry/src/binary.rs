//! 二值化.
//!
//! 模式决定送入阈值选择的信号 (边缘响应或校正平面本身) 与比较方向.

use crate::data::{CrossSection, Mask, Plane};
use crate::error::{AnalysisResult, ConfigError};
use crate::filters::sobel_magnitude;
use crate::threshold::{threshold_of, ThresholdMethod};
use ndarray::Array2;
use std::str::FromStr;

/// 比较方向.
///
/// 极性只有两个取值, 以枚举表达, 流水线内部不做自由字符串匹配.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Polarity {
    /// 信号小于阈值算前景 (亮背景上的暗对象).
    Less,

    /// 信号大于阈值算前景 (暗背景上的亮对象).
    ///
    /// 两个极性只差比较方向; 当阈值不等于任何实际像素值时,
    /// `Contrast` 与 `Contrast-positive` 掩膜互为精确补集.
    Greater,
}

impl Polarity {
    /// 判断一个信号值在该极性下是否属于前景.
    #[inline]
    pub fn eval(&self, signal: f64, threshold: f64) -> bool {
        match self {
            Polarity::Less => signal < threshold,
            Polarity::Greater => signal > threshold,
        }
    }
}

/// 二值化模式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinarizeMode {
    /// 阈值作用于边缘响应, 大于阈值算前景. 适用于未染色图像.
    Borders,

    /// 阈值直接作用于校正平面, 小于阈值算前景 (暗对象).
    Contrast,

    /// 阈值直接作用于校正平面, 大于阈值算前景 (亮对象). 适用于染色图像.
    ContrastPositive,
}

impl BinarizeMode {
    /// 模式的展示名.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinarizeMode::Borders => "Borders",
            BinarizeMode::Contrast => "Contrast",
            BinarizeMode::ContrastPositive => "Contrast-positive",
        }
    }

    /// 模式对应的比较方向.
    #[inline]
    pub fn polarity(&self) -> Polarity {
        match self {
            BinarizeMode::Contrast => Polarity::Less,
            BinarizeMode::Borders | BinarizeMode::ContrastPositive => Polarity::Greater,
        }
    }
}

impl FromStr for BinarizeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Borders" => Ok(BinarizeMode::Borders),
            "Contrast" => Ok(BinarizeMode::Contrast),
            "Contrast-positive" => Ok(BinarizeMode::ContrastPositive),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// 二值化参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinarizeParams {
    /// 阈值方法.
    pub method: ThresholdMethod,

    /// 二值化模式.
    pub mode: BinarizeMode,

    /// 阈值偏移 (百分比, 合法区间 \[-50, 50\]).
    pub offset_percent: f64,
}

impl Default for BinarizeParams {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::Mean,
            mode: BinarizeMode::Borders,
            offset_percent: 0.0,
        }
    }
}

impl BinarizeParams {
    /// 从展示名构造参数. 未知名字返回 [`ConfigError`], 绝不静默回退.
    pub fn from_names(method: &str, mode: &str, offset_percent: f64) -> AnalysisResult<Self> {
        Ok(Self {
            method: method.parse()?,
            mode: mode.parse()?,
            offset_percent,
        })
    }
}

/// 二值化结果.
///
/// 除掩膜外还暴露预二值化信号与阈值, 供外部图表渲染; 读取它们不修改任何状态.
#[derive(Clone, Debug)]
pub struct Binarized {
    /// 前景掩膜.
    pub mask: Mask,

    /// 预二值化信号 (边缘响应或校正平面).
    pub pre_binary: Plane,

    /// 实际使用的阈值.
    pub threshold: f64,
}

impl Binarized {
    /// 提取预二值化信号的横截面.
    ///
    /// `row` 为 `None` 时取垂直中线 (高度的一半).
    pub fn cross_section(&self, row: Option<usize>) -> CrossSection {
        let row = row.unwrap_or(self.pre_binary.height() / 2);
        CrossSection {
            row,
            signal: self.pre_binary.row(row),
            threshold: self.threshold,
        }
    }
}

/// 对校正平面做一次完整的二值化.
pub fn binarize(corrected: &Array2<u8>, p: &BinarizeParams) -> Binarized {
    let pre_binary = match p.mode {
        BinarizeMode::Borders => Plane::F64(sobel_magnitude(corrected)),
        BinarizeMode::Contrast | BinarizeMode::ContrastPositive => Plane::U8(corrected.clone()),
    };

    let threshold = threshold_of(&pre_binary, p.method, p.offset_percent);
    log::debug!(
        "二值化: mode={}, method={}, threshold={threshold}",
        p.mode.as_str(),
        p.method.as_str(),
    );

    let polarity = p.mode.polarity();
    let (h, w) = pre_binary.shape();
    let mask = Mask::new(Array2::from_shape_fn((h, w), |pos| {
        polarity.eval(pre_binary.value_at(pos), threshold)
    }));

    Binarized {
        mask,
        pre_binary,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_contrast_modes_are_complements() {
        // 奇数个像素的双档图像, 均值阈值落在两档之间且不与任何像素值重合.
        let plane = Array2::from_shape_fn((5, 5), |(i, _)| if i < 2 { 10u8 } else { 201 });
        let dark = binarize(
            &plane,
            &BinarizeParams {
                method: ThresholdMethod::Mean,
                mode: BinarizeMode::Contrast,
                offset_percent: 0.0,
            },
        );
        let bright = binarize(
            &plane,
            &BinarizeParams {
                method: ThresholdMethod::Mean,
                mode: BinarizeMode::ContrastPositive,
                offset_percent: 0.0,
            },
        );
        assert_eq!(dark.threshold, bright.threshold);
        assert_eq!(dark.mask, bright.mask.inverted());
    }

    #[test]
    fn test_borders_mode_marks_step_boundary() {
        // 左黑右白: 掩膜的前景带落在边界列 ± 边缘核支撑范围内.
        let plane = Array2::from_shape_fn((100, 100), |(_, j)| if j < 50 { 0u8 } else { 255 });
        let out = binarize(
            &plane,
            &BinarizeParams {
                method: ThresholdMethod::Otsu,
                mode: BinarizeMode::Borders,
                offset_percent: 0.0,
            },
        );
        assert!(out.mask.count() > 0);
        for (pos, &pix) in out.mask.indexed_iter() {
            if pix {
                assert!((48..=51).contains(&pos.1), "前景超出边界带: {pos:?}");
            }
        }
    }

    #[test]
    fn test_uniform_plane_both_polarities_empty() {
        // 无纹理图像: 阈值与常数像素值重合, 两个严格比较方向都给出空前景.
        let plane = Array2::from_elem((10, 10), 100u8);
        for mode in [BinarizeMode::Contrast, BinarizeMode::ContrastPositive] {
            let out = binarize(
                &plane,
                &BinarizeParams {
                    method: ThresholdMethod::Mean,
                    mode,
                    offset_percent: 0.0,
                },
            );
            assert_eq!(out.threshold, 100.0);
            assert_eq!(out.mask.count(), 0);
        }
    }

    #[test]
    fn test_cross_section_defaults_to_midline() {
        let plane = Array2::from_shape_fn((20, 10), |(i, _)| i as u8);
        let out = binarize(&plane, &BinarizeParams::default());
        let cs = out.cross_section(None);
        assert_eq!(cs.row, 10);
        assert_eq!(cs.signal.len(), 10);
        assert_eq!(cs.threshold, out.threshold);

        let cs = out.cross_section(Some(3));
        assert_eq!(cs.row, 3);
    }

    #[test]
    fn test_unknown_mode_name_is_config_error() {
        assert_eq!(
            BinarizeParams::from_names("Otsu", "Edges", 0.0),
            Err(ConfigError::UnknownMode("Edges".to_string()))
        );
        assert!(BinarizeParams::from_names("Otsu", "Contrast-positive", 0.0).is_ok());
    }
}
