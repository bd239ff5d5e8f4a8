//! 染色细胞的分水岭分割与计数.
//!
//! 同一张校正图跑两次独立二值化: 紧的种子掩膜用于找细胞中心,
//! 松的包含掩膜用于约束区域生长; 随后距离变换 → 局部极大值标记 →
//! marker 分水岭 → 尺寸分类 → 统计.

pub(crate) mod distance;
pub(crate) mod markers;
mod watershed;

use crate::binary::{binarize, BinarizeMode, BinarizeParams, Binarized};
use crate::consts::{cell_defaults, rgb};
use crate::correct::{correct, Corrected, CorrectionParams};
use crate::data::{banded_rgb, paint_border, AssayImage, Channel, Mask, Renderable};
use crate::error::{AnalysisResult, ConfigError, OpenError};
use crate::report::{fmt_f64, Field, ReportRow};
use crate::threshold::ThresholdMethod;
use ndarray::{Array2, Array3};
use once_cell::sync::Lazy;
use std::path::Path;

pub use distance::distance_transform as euclidean_distance_transform;

/// 标记横截面位置的色带宽度 (像素).
const BAND_WIDTH: usize = 11;

/// 标签着色盘的颜色个数.
const PALETTE_LEN: usize = 64;

/// 确定性伪随机标签着色盘. 0 号标签 (背景) 恒为黑色.
static LABEL_PALETTE: Lazy<[[u8; 3]; PALETTE_LEN]> = Lazy::new(|| {
    let mut palette = [[0u8; 3]; PALETTE_LEN];
    let mut rng = 99u64;
    let mut next = || {
        rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
        (1 + (rng >> 33) % 255) as u8
    };
    for color in palette.iter_mut().skip(1) {
        *color = [next(), next(), next()];
    }
    palette
});

/// 细胞分割参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellParams {
    /// 种子掩膜的阈值方法 (紧/保守档).
    pub seed_method: ThresholdMethod,

    /// 种子掩膜的阈值偏移 (百分比).
    pub seed_offset_percent: f64,

    /// 包含掩膜的阈值方法 (松档).
    pub contain_method: ThresholdMethod,

    /// 包含掩膜的阈值偏移 (百分比).
    pub contain_offset_percent: f64,

    /// 局部极大值之间的最小间隔 (像素).
    pub min_distance: u32,

    /// 局部极大值 footprint 的圆盘半径.
    pub disk_radius: u32,

    /// 细胞/碎屑的尺寸门限 (像素个数). 不允许为负.
    pub size_threshold: f64,

    /// 叠加图边框宽度 (像素).
    pub border_size: u32,

    /// 叠加图边框颜色.
    pub border_color: [u8; 3],
}

impl Default for CellParams {
    fn default() -> Self {
        Self {
            seed_method: ThresholdMethod::Minimum,
            seed_offset_percent: cell_defaults::SEED_OFFSET_PERCENT,
            contain_method: ThresholdMethod::Otsu,
            contain_offset_percent: cell_defaults::CONTAIN_OFFSET_PERCENT,
            min_distance: cell_defaults::MIN_DISTANCE,
            disk_radius: cell_defaults::DISK_RADIUS,
            size_threshold: cell_defaults::SIZE_THRESHOLD,
            border_size: cell_defaults::BORDER_SIZE,
            border_color: rgb::RED,
        }
    }
}

impl CellParams {
    /// 校验数值参数的定义域.
    fn validate(&self) -> AnalysisResult<()> {
        if self.size_threshold < 0.0 {
            return Err(ConfigError::NegativeSizeThreshold(self.size_threshold));
        }
        Ok(())
    }
}

/// 细胞统计.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellStat {
    /// 对象总数 (最大标签号).
    pub n_objects: usize,

    /// 碎屑个数 (尺寸小于门限的对象).
    pub n_debris: usize,

    /// 细胞个数 (尺寸不小于门限的对象).
    pub n_cells: usize,

    /// 细胞尺寸均值 (像素). 无细胞时为 NaN 哨兵.
    pub mean_cell_size: f64,

    /// 细胞尺寸标准差 (总体). 无细胞时为 NaN 哨兵.
    pub sd_cell_size: f64,

    /// 铺满度: 细胞标签像素占全图的百分比.
    pub confluence_percent: f64,
}

impl CellStat {
    /// 由各标签的像素数与尺寸门限推导统计.
    ///
    /// 空标签集 (没有任何种子) 不会 panic: 计数全零,
    /// 均值/标准差以 NaN 哨兵表示未定义.
    fn derive(sizes: &[usize], size_threshold: f64, total_pixels: usize) -> Self {
        let n_objects = sizes.len();
        let cell_sizes: Vec<usize> = sizes
            .iter()
            .copied()
            .filter(|&s| s as f64 >= size_threshold)
            .collect();
        let n_cells = cell_sizes.len();
        let n_debris = n_objects - n_cells;

        let (mean, sd) = if n_cells == 0 {
            log::warn!("不存在达到尺寸门限的细胞, 均值/标准差以 NaN 哨兵上报");
            (f64::NAN, f64::NAN)
        } else {
            let n = n_cells as f64;
            let mean = cell_sizes.iter().map(|&s| s as f64).sum::<f64>() / n;
            let var = cell_sizes
                .iter()
                .map(|&s| {
                    let d = s as f64 - mean;
                    d * d
                })
                .sum::<f64>()
                / n;
            (mean, var.sqrt())
        };

        let cell_pixels: usize = cell_sizes.iter().sum();
        let confluence_percent = if total_pixels == 0 {
            0.0
        } else {
            cell_pixels as f64 * 100.0 / total_pixels as f64
        };
        debug_assert!((0.0..=100.0).contains(&confluence_percent));

        Self {
            n_objects,
            n_debris,
            n_cells,
            mean_cell_size: mean,
            sd_cell_size: sd,
            confluence_percent,
        }
    }
}

/// 一次成功 `apply` 的全部产物.
#[derive(Clone, Debug)]
struct CellOutcome {
    corrected: Corrected,
    seed: Binarized,
    labels: Array2<u32>,
    sizes: Vec<usize>,
    stat: CellStat,
    overlay: Array3<u8>,
    called: Vec<Field>,
    row: usize,
}

/// 一次 `apply` 的完整参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellApply {
    /// 光度校正参数.
    pub correction: CorrectionParams,

    /// 分割参数.
    pub cells: CellParams,

    /// 横截面行号. `None` 取垂直中线.
    pub row: Option<usize>,
}

impl Default for CellApply {
    fn default() -> Self {
        Self {
            correction: CorrectionParams {
                channel: Channel::Green,
                ..Default::default()
            },
            cells: CellParams::default(),
            row: None,
        }
    }
}

impl CellApply {
    /// 组装本次调用的参数键值对 (provenance), 供报告协作者记录.
    fn called_with(&self, resolved_channel: &str) -> Vec<Field> {
        vec![
            ("channel", resolved_channel.to_string()),
            ("bright", fmt_f64(self.correction.brightness)),
            ("contr", fmt_f64(self.correction.contrast)),
            ("blur_radius", fmt_f64(self.correction.blur_radius)),
            ("equal_exposure", self.correction.equalize.to_string()),
            ("inverse", self.correction.invert.to_string()),
            ("binary_filter", self.cells.seed_method.as_str().to_string()),
            ("mask_filter", self.cells.contain_method.as_str().to_string()),
            ("offset_binary", fmt_f64(self.cells.seed_offset_percent)),
            ("offset_mask", fmt_f64(self.cells.contain_offset_percent)),
            ("min_dist", self.cells.min_distance.to_string()),
            ("disk_radius", self.cells.disk_radius.to_string()),
            ("size_thresh", fmt_f64(self.cells.size_threshold)),
        ]
    }
}

/// 细胞计数分析器. 独占一张源图像.
#[derive(Clone, Debug)]
pub struct CellAnalyzer {
    image: AssayImage,
    outcome: Option<CellOutcome>,
}

impl CellAnalyzer {
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

    /// 运行完整流水线.
    ///
    /// 配置非法时返回错误, 且不触碰上一次的产物.
    pub fn apply(&mut self, p: &CellApply) -> AnalysisResult<()> {
        p.cells.validate()?;

        let corrected = correct(&self.image, &p.correction);

        // 两次独立二值化, 均为 Contrast-positive 极性.
        let seed = binarize(
            &corrected.plane,
            &BinarizeParams {
                method: p.cells.seed_method,
                mode: BinarizeMode::ContrastPositive,
                offset_percent: p.cells.seed_offset_percent,
            },
        );
        let contain = binarize(
            &corrected.plane,
            &BinarizeParams {
                method: p.cells.contain_method,
                mode: BinarizeMode::ContrastPositive,
                offset_percent: p.cells.contain_offset_percent,
            },
        );

        let dist = distance::distance_transform(&seed.mask);
        let seeds = markers::find_markers(&dist, p.cells.min_distance, p.cells.disk_radius);
        let n_seeds = markers::marker_count(&seeds);

        let labels = if n_seeds == 0 {
            log::warn!("未找到任何种子标记, 标签图整体为背景");
            Array2::zeros(seeds.raw_dim())
        } else {
            let surface = dist.mapv(|v| -v);
            watershed::watershed(&surface, &seeds, &contain.mask)
        };

        // 按标签统计像素个数. 标签号是临时的, 每次调用后都需重新查询.
        let mut sizes = vec![0usize; n_seeds as usize];
        for &lab in labels.iter() {
            if lab > 0 {
                sizes[(lab - 1) as usize] += 1;
            }
        }

        let stat = CellStat::derive(&sizes, p.cells.size_threshold, self.image.size());
        let overlay = self.cell_overlay(&labels, &sizes, p);
        let row = p.row.unwrap_or(self.image.height() / 2);
        let called = p.called_with(corrected.channel.as_str());

        self.outcome = Some(CellOutcome {
            corrected,
            seed,
            labels,
            sizes,
            stat,
            overlay,
            called,
            row,
        });
        Ok(())
    }

    /// 细胞边缘叠加图: 只取达到尺寸门限的标签, 提取边缘并加粗后画在原图上.
    fn cell_overlay(&self, labels: &Array2<u32>, sizes: &[usize], p: &CellApply) -> Array3<u8> {
        let cell_only = Mask::new(labels.mapv(|lab| {
            lab > 0 && sizes[(lab - 1) as usize] as f64 >= p.cells.size_threshold
        }));
        let border = cell_only.edges().dilate_square(p.cells.border_size);
        let mut base = self.image.original_rgb();
        paint_border(&mut base, &border, p.cells.border_color);
        base
    }

    /// 最近一次 `apply` 的标签图. 0 为背景, 正整数为互不相同的连通区域.
    pub fn labels(&self) -> Option<&Array2<u32>> {
        self.outcome.as_ref().map(|o| &o.labels)
    }

    /// 最近一次 `apply` 各标签的像素个数 (下标 = 标签号 − 1).
    pub fn label_sizes(&self) -> Option<&[usize]> {
        self.outcome.as_ref().map(|o| o.sizes.as_slice())
    }

    /// 最近一次 `apply` 的统计.
    pub fn stat(&self) -> Option<CellStat> {
        self.outcome.as_ref().map(|o| o.stat)
    }

    /// 报告统计键值对.
    pub fn report_stat(&self) -> Option<Vec<Field>> {
        self.outcome.as_ref().map(|o| {
            vec![
                ("n_objects", o.stat.n_objects.to_string()),
                ("n_debris", o.stat.n_debris.to_string()),
                ("n_cells", o.stat.n_cells.to_string()),
                ("mean_cell_size", fmt_f64(o.stat.mean_cell_size)),
                ("sd_cell_size", fmt_f64(o.stat.sd_cell_size)),
                ("confluence_percent", fmt_f64(o.stat.confluence_percent)),
            ]
        })
    }

    /// 最近一次 `apply` 所用的全部参数.
    pub fn called_with(&self) -> Option<&[Field]> {
        self.outcome.as_ref().map(|o| o.called.as_slice())
    }

    /// 三件可渲染产物: 标记了横截面色带的校正图, 种子阈值横截面, 叠加图.
    pub fn images(&self) -> Option<[Renderable; 3]> {
        self.outcome.as_ref().map(|o| {
            [
                Renderable::Rgb(banded_rgb(
                    &o.corrected.plane,
                    o.row,
                    BAND_WIDTH,
                    rgb::RED,
                )),
                Renderable::CrossSection(o.seed.cross_section(Some(o.row))),
                Renderable::Rgb(o.overlay.clone()),
            ]
        })
    }

    /// 以确定性着色盘渲染标签图 (调试/展示用).
    pub fn label_image(&self) -> Option<Array3<u8>> {
        self.outcome.as_ref().map(|o| {
            let (h, w) = {
                let &[h, w] = o.labels.shape() else {
                    unreachable!()
                };
                (h, w)
            };
            let mut ans = Array3::<u8>::zeros((h, w, 3));
            for ((i, j), &lab) in o.labels.indexed_iter() {
                let color = LABEL_PALETTE[lab as usize % PALETTE_LEN];
                for (c, &v) in color.iter().enumerate() {
                    ans[(i, j, c)] = v;
                }
            }
            ans
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
}

/// 对一组标签尺寸做 (细胞数, 碎屑数) 分类统计, 供外部在不同门限下复查.
pub fn classify_sizes(sizes: &[usize], size_threshold: f64) -> (usize, usize) {
    let n_cells = sizes
        .iter()
        .filter(|&&s| s as f64 >= size_threshold)
        .count();
    (n_cells, sizes.len() - n_cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::disk_offsets;
    use ndarray::Array2;

    /// 两个半径 10 的亮圆盘 (值 200), 背景 10.
    fn two_disk_image() -> (AssayImage, usize) {
        let mut plane = Array2::from_elem((100, 100), 10u8);
        let mut disk_pixels = 0usize;
        for &(ch, cw) in &[(30usize, 30usize), (70, 70)] {
            for (dh, dw) in disk_offsets(10) {
                plane[((ch as i32 + dh) as usize, (cw as i32 + dw) as usize)] = 200;
                disk_pixels += 1;
            }
        }
        (AssayImage::from_gray(plane), disk_pixels)
    }

    fn disk_apply() -> CellApply {
        CellApply {
            correction: CorrectionParams::default(),
            cells: CellParams {
                seed_method: ThresholdMethod::Otsu,
                contain_method: ThresholdMethod::Otsu,
                ..Default::default()
            },
            row: None,
        }
    }

    #[test]
    fn test_two_disks_count_as_two_cells() {
        let (image, disk_pixels) = two_disk_image();
        let mut analyzer = CellAnalyzer::new(image);
        analyzer.apply(&disk_apply()).unwrap();
        let stat = analyzer.stat().unwrap();

        assert_eq!(stat.n_objects, 2);
        assert_eq!(stat.n_cells, 2);
        assert_eq!(stat.n_debris, 0);
        // 铺满度与圆盘总面积一致 (舍入误差内).
        let expect = disk_pixels as f64 * 100.0 / 10_000.0;
        assert!((stat.confluence_percent - expect).abs() < 0.5);
        // 两个圆盘同样大, 标准差接近 0.
        assert!(stat.sd_cell_size < 2.0);
        assert!((stat.mean_cell_size - disk_pixels as f64 / 2.0).abs() < 10.0);
    }

    #[test]
    fn test_size_threshold_monotonicity() {
        let (image, _) = two_disk_image();
        let mut analyzer = CellAnalyzer::new(image);
        analyzer.apply(&disk_apply()).unwrap();
        let sizes = analyzer.label_sizes().unwrap().to_vec();

        let mut last_cells = usize::MAX;
        let mut last_debris = 0usize;
        for threshold in [0.0, 10.0, 100.0, 400.0, 10_000.0] {
            let (cells, debris) = classify_sizes(&sizes, threshold);
            assert!(cells <= last_cells, "细胞数随门限上升而增加");
            assert!(debris >= last_debris, "碎屑数随门限上升而减少");
            last_cells = cells;
            last_debris = debris;
        }
    }

    #[test]
    fn test_no_markers_reports_nan_sentinels_without_panic() {
        // 全黑图像: 种子掩膜为空, 不存在任何标记.
        let image = AssayImage::from_gray(Array2::from_elem((50, 50), 0u8));
        let mut analyzer = CellAnalyzer::new(image);
        analyzer.apply(&disk_apply()).unwrap();
        let stat = analyzer.stat().unwrap();

        assert_eq!(stat.n_objects, 0);
        assert_eq!(stat.n_cells, 0);
        assert_eq!(stat.n_debris, 0);
        assert!(stat.mean_cell_size.is_nan());
        assert!(stat.sd_cell_size.is_nan());
        assert_eq!(stat.confluence_percent, 0.0);
        assert!(analyzer.labels().unwrap().iter().all(|&l| l == 0));
    }

    #[test]
    fn test_confluence_bounded() {
        for value in [0u8, 128, 255] {
            let image = AssayImage::from_gray(Array2::from_elem((40, 40), value));
            let mut analyzer = CellAnalyzer::new(image);
            analyzer.apply(&disk_apply()).unwrap();
            let c = analyzer.stat().unwrap().confluence_percent;
            assert!((0.0..=100.0).contains(&c));
        }
    }

    #[test]
    fn test_negative_size_threshold_is_config_error() {
        let (image, _) = two_disk_image();
        let mut analyzer = CellAnalyzer::new(image);
        let mut p = disk_apply();
        p.cells.size_threshold = -1.0;
        assert_eq!(
            analyzer.apply(&p),
            Err(ConfigError::NegativeSizeThreshold(-1.0))
        );
        // 失败的 apply 不产生任何产物.
        assert!(analyzer.stat().is_none());
        assert!(analyzer.report_row().is_none());
    }

    #[test]
    fn test_label_ids_start_from_one_and_sizes_align() {
        let (image, _) = two_disk_image();
        let mut analyzer = CellAnalyzer::new(image);
        analyzer.apply(&disk_apply()).unwrap();
        let labels = analyzer.labels().unwrap();
        let sizes = analyzer.label_sizes().unwrap();
        let mut recount = vec![0usize; sizes.len()];
        for &lab in labels.iter() {
            if lab > 0 {
                recount[(lab - 1) as usize] += 1;
            }
        }
        assert_eq!(recount, sizes);
    }

    #[test]
    fn test_called_with_uses_model_keys() {
        let (image, _) = two_disk_image();
        let mut analyzer = CellAnalyzer::new(image);
        analyzer.apply(&disk_apply()).unwrap();
        let called = analyzer.called_with().unwrap();
        for key in [
            "channel",
            "binary_filter",
            "mask_filter",
            "offset_binary",
            "offset_mask",
            "min_dist",
            "disk_radius",
            "size_thresh",
        ] {
            assert!(called.iter().any(|(k, _)| *k == key), "缺少键 {key}");
        }
    }

    #[test]
    fn test_report_row_renders_nan_sentinel() {
        let image = AssayImage::from_gray(Array2::from_elem((30, 30), 0u8));
        let mut analyzer = CellAnalyzer::new(image);
        analyzer.apply(&disk_apply()).unwrap();
        let row = analyzer.report_row().unwrap();
        assert!(row
            .fields
            .contains(&("mean_cell_size", "NaN".to_string())));
    }
}
