//! 伤口 (划痕) 区域分割与统计.
//!
//! 流水线状态依次为: 已加载 → 已校正 → 已二值化 → 已分割.
//! 每次 `apply` 都从不可变原图重新走完整条链.

use crate::binary::{binarize, BinarizeParams, Binarized};
use crate::consts::{confluency_defaults, rgb, wound_defaults};
use crate::correct::{correct, Corrected, CorrectionParams};
use crate::data::{banded_rgb, paint_border, AssayImage, CrossSection, Mask, Renderable};
use crate::error::{AnalysisResult, OpenError};
use crate::report::{fmt_f64, Field, ReportRow};
use ndarray::Array3;
use std::path::Path;

/// 标记横截面位置的色带宽度 (像素).
const BAND_WIDTH: usize = 11;

/// 伤口分割参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WoundParams {
    /// 圆盘结构元半径, 用于闭/开运算平滑掩膜边界.
    pub disk_radius: u32,

    /// 伤口内部允许的最小对象尺寸 (占全图百分比).
    /// 小于该尺寸的前景区域被视为伤口内的碎屑并清除.
    pub min_objects_percent: f64,

    /// 允许的最小伤口碎片尺寸 (占全图百分比).
    /// 小于该尺寸的背景区域被视为误检的伤口碎片并清除.
    pub min_wound_percent: f64,

    /// 叠加图边框宽度 (像素).
    pub border_size: u32,

    /// 叠加图边框颜色.
    pub border_color: [u8; 3],
}

impl Default for WoundParams {
    fn default() -> Self {
        Self {
            disk_radius: wound_defaults::DISK_RADIUS,
            min_objects_percent: wound_defaults::MIN_OBJECTS_PERCENT,
            min_wound_percent: wound_defaults::MIN_WOUND_PERCENT,
            border_size: wound_defaults::BORDER_SIZE,
            border_color: rgb::RED,
        }
    }
}

/// 伤口统计.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WoundStat {
    /// 前景面积占比 (百分数).
    pub area_percent: f64,

    /// 平均伤口宽度 (像素): 前景像素数 / 图像高.
    /// 该代理量假设伤口是大致水平的条带.
    pub mean_width_px: f64,
}

impl WoundStat {
    /// 从最终掩膜计算统计. 退化尺寸不会 panic, 统计降级为零值.
    pub fn from_mask(mask: &Mask) -> Self {
        let pixels = mask.size();
        let height = mask.height();
        let count = mask.count();
        if pixels == 0 || height == 0 {
            log::warn!("掩膜尺寸退化, 伤口统计降级为零值");
            return Self {
                area_percent: 0.0,
                mean_width_px: 0.0,
            };
        }
        Self {
            area_percent: count as f64 * 100.0 / pixels as f64,
            mean_width_px: count as f64 / height as f64,
        }
    }
}

/// 形态学清理: 闭/开平滑 → 双极性小对象清理.
///
/// 两步相反极性的清理是有意为之, 前景对象与背景碎片各有独立的尺寸门限:
///
/// 1. 以 `disk_radius` 圆盘先闭后开, 平滑掩膜边界;
/// 2. 清除小于 `min_objects_percent` 的前景区域 (伤口内碎屑);
/// 3. 取反, 清除小于 `min_wound_percent` 的 (原) 背景区域
///   (伤口外的误检碎片), 再取反还原极性.
pub fn clean_mask(mask: &Mask, p: &WoundParams) -> Mask {
    let mut m = mask.close_disk(p.disk_radius).open_disk(p.disk_radius);

    let pixels = m.size() as f64;
    let object_size = (pixels * p.min_objects_percent / 100.0).round() as usize;
    let wound_size = (pixels * p.min_wound_percent / 100.0).round() as usize;

    m.remove_small(object_size);
    m.invert();
    m.remove_small(wound_size);
    m.invert();
    m
}

/// 合成叠加图: 掩膜边缘经 `border_size` 方形膨胀后,
/// 以 `border_color` 画在原图 (而非校正图) 的三通道副本上.
pub fn overlay(img: &AssayImage, mask: &Mask, border_size: u32, color: [u8; 3]) -> Array3<u8> {
    let border = mask.edges().dilate_square(border_size);
    let mut base = img.original_rgb();
    paint_border(&mut base, &border, color);
    base
}

/// 一次 `apply` 的完整参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WoundApply {
    /// 光度校正参数.
    pub correction: CorrectionParams,

    /// 二值化参数.
    pub binarize: BinarizeParams,

    /// 分割参数.
    pub wound: WoundParams,

    /// 横截面行号. `None` 取垂直中线.
    pub row: Option<usize>,
}

impl Default for WoundApply {
    fn default() -> Self {
        Self {
            correction: CorrectionParams {
                contrast: wound_defaults::CONTRAST,
                blur_radius: wound_defaults::BLUR_RADIUS,
                equalize: true,
                ..Default::default()
            },
            binarize: BinarizeParams::default(),
            wound: WoundParams::default(),
            row: None,
        }
    }
}

impl WoundApply {
    /// 组装本次调用的参数键值对 (provenance), 供报告协作者记录.
    fn called_with(&self, resolved_channel: &str) -> Vec<Field> {
        vec![
            ("channel", resolved_channel.to_string()),
            ("bright", fmt_f64(self.correction.brightness)),
            ("contr", fmt_f64(self.correction.contrast)),
            ("blur_radius", fmt_f64(self.correction.blur_radius)),
            ("equal_exposure", self.correction.equalize.to_string()),
            ("inverse", self.correction.invert.to_string()),
            ("filter", self.binarize.method.as_str().to_string()),
            ("mode", self.binarize.mode.as_str().to_string()),
            ("offset", fmt_f64(self.binarize.offset_percent)),
            ("disk_radius", self.wound.disk_radius.to_string()),
            ("min_objects", fmt_f64(self.wound.min_objects_percent)),
            ("min_wound", fmt_f64(self.wound.min_wound_percent)),
        ]
    }
}

/// 一次成功 `apply` 的全部产物. 下一次 `apply` 会整体取代它.
#[derive(Clone, Debug)]
struct WoundOutcome {
    corrected: Corrected,
    binarized: Binarized,
    final_mask: Mask,
    overlay: Array3<u8>,
    stat: WoundStat,
    called: Vec<Field>,
    row: usize,
    disk_radius: u32,
}

/// 划痕实验分析器. 独占一张源图像.
#[derive(Clone, Debug)]
pub struct WoundAnalyzer {
    image: AssayImage,
    outcome: Option<WoundOutcome>,
}

impl WoundAnalyzer {
    /// 从已解码的缓冲构造分析器.
    #[inline]
    pub fn new(image: AssayImage) -> Self {
        Self {
            image,
            outcome: None,
        }
    }

    /// 打开本地文件并构造分析器. 解码失败返回携带路径的 [`OpenError`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        Ok(Self::new(AssayImage::open(path)?))
    }

    /// 源图像.
    #[inline]
    pub fn image(&self) -> &AssayImage {
        &self.image
    }

    /// 运行完整流水线: 校正 → 二值化 → 形态学清理 → 统计 + 叠加图.
    ///
    /// 所有派生数组都从不可变原图重新计算.
    pub fn apply(&mut self, p: &WoundApply) -> AnalysisResult<()> {
        let corrected = correct(&self.image, &p.correction);
        let binarized = binarize(&corrected.plane, &p.binarize);
        let final_mask = clean_mask(&binarized.mask, &p.wound);
        let stat = WoundStat::from_mask(&final_mask);
        let overlay = overlay(
            &self.image,
            &final_mask,
            p.wound.border_size,
            p.wound.border_color,
        );
        let row = p.row.unwrap_or(self.image.height() / 2);
        let called = p.called_with(corrected.channel.as_str());

        self.outcome = Some(WoundOutcome {
            corrected,
            binarized,
            final_mask,
            overlay,
            stat,
            called,
            row,
            disk_radius: p.wound.disk_radius,
        });
        Ok(())
    }

    /// 最近一次 `apply` 的最终掩膜.
    pub fn final_mask(&self) -> Option<&Mask> {
        self.outcome.as_ref().map(|o| &o.final_mask)
    }

    /// 最近一次 `apply` 的统计.
    pub fn stat(&self) -> Option<WoundStat> {
        self.outcome.as_ref().map(|o| o.stat)
    }

    /// 报告统计键值对.
    pub fn report_stat(&self) -> Option<Vec<Field>> {
        self.outcome.as_ref().map(|o| {
            vec![
                ("wound_area_percent", fmt_f64(o.stat.area_percent)),
                ("mean_width_px", fmt_f64(o.stat.mean_width_px)),
            ]
        })
    }

    /// 最近一次 `apply` 所用的全部参数.
    pub fn called_with(&self) -> Option<&[Field]> {
        self.outcome.as_ref().map(|o| o.called.as_slice())
    }

    /// 三件可渲染产物: 标记了横截面色带的校正图, 横截面图表数据, 叠加图.
    pub fn images(&self) -> Option<[Renderable; 3]> {
        self.outcome.as_ref().map(|o| {
            [
                Renderable::Rgb(banded_rgb(
                    &o.corrected.plane,
                    o.row,
                    BAND_WIDTH,
                    rgb::RED,
                )),
                Renderable::CrossSection(self.smoothed_cross_section(o)),
                Renderable::Rgb(o.overlay.clone()),
            ]
        })
    }

    /// 组装报告行 (文件标识 + 参数 + 统计).
    pub fn report_row(&self) -> Option<ReportRow> {
        let called = self.called_with()?;
        let stat = self.report_stat()?;
        let mut fields = called.to_vec();
        fields.extend(stat);
        Some(ReportRow::new(
            self.image.path().display().to_string(),
            fields,
        ))
    }

    /// 横截面信号, 以宽度为 `disk_radius` 的均值核做一次 "valid" 平滑.
    fn smoothed_cross_section(&self, o: &WoundOutcome) -> CrossSection {
        let raw = o.binarized.cross_section(Some(o.row));
        let width = usize::max(1, o.disk_radius as usize);
        CrossSection {
            row: raw.row,
            signal: mean_filter_valid(&raw.signal, width),
            threshold: raw.threshold,
        }
    }
}

/// 宽度为 `width` 的滑动均值, "valid" 模式 (输出比输入短 `width - 1`).
fn mean_filter_valid(signal: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 || signal.len() < width {
        return signal.to_vec();
    }
    let inv = 1.0 / width as f64;
    signal
        .windows(width)
        .map(|w| w.iter().sum::<f64>() * inv)
        .collect()
}

/// 细胞铺满度 (confluency) 分析器.
///
/// 复用伤口流水线分割细胞之间的空隙: 空隙就是 "伤口",
/// 铺满度 = 100 − 空隙面积占比.
#[derive(Clone, Debug)]
pub struct ConfluencyAnalyzer {
    inner: WoundAnalyzer,
}

impl ConfluencyAnalyzer {
    /// 从已解码的缓冲构造分析器.
    #[inline]
    pub fn new(image: AssayImage) -> Self {
        Self {
            inner: WoundAnalyzer::new(image),
        }
    }

    /// 打开本地文件并构造分析器.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        Ok(Self::new(AssayImage::open(path)?))
    }

    /// 该实验的默认参数档位 (与伤口实验不同).
    pub fn default_apply() -> WoundApply {
        WoundApply {
            correction: CorrectionParams {
                contrast: confluency_defaults::CONTRAST,
                blur_radius: confluency_defaults::BLUR_RADIUS,
                equalize: true,
                ..Default::default()
            },
            binarize: BinarizeParams::default(),
            wound: WoundParams {
                disk_radius: confluency_defaults::DISK_RADIUS,
                min_objects_percent: confluency_defaults::MIN_OBJECTS_PERCENT,
                min_wound_percent: confluency_defaults::MIN_FREE_PERCENT,
                border_size: confluency_defaults::BORDER_SIZE,
                border_color: rgb::RED,
            },
            row: None,
        }
    }

    /// 运行完整流水线.
    #[inline]
    pub fn apply(&mut self, p: &WoundApply) -> AnalysisResult<()> {
        self.inner.apply(p)
    }

    /// 铺满度 (百分数): `100 − 空隙面积占比`.
    pub fn confluency_percent(&self) -> Option<f64> {
        self.inner
            .stat()
            .map(|s| (100.0 - s.area_percent).clamp(0.0, 100.0))
    }

    /// 报告统计键值对.
    pub fn report_stat(&self) -> Option<Vec<Field>> {
        self.confluency_percent()
            .map(|c| vec![("confluency_percent", fmt_f64(c))])
    }

    /// 最近一次 `apply` 所用的全部参数.
    #[inline]
    pub fn called_with(&self) -> Option<&[Field]> {
        self.inner.called_with()
    }

    /// 三件可渲染产物.
    #[inline]
    pub fn images(&self) -> Option<[Renderable; 3]> {
        self.inner.images()
    }

    /// 组装报告行.
    pub fn report_row(&self) -> Option<ReportRow> {
        let called = self.called_with()?;
        let stat = self.report_stat()?;
        let mut fields = called.to_vec();
        fields.extend(stat);
        Some(ReportRow::new(
            self.inner.image().path().display().to_string(),
            fields,
        ))
    }
}
