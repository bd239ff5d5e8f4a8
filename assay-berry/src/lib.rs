#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供划痕迁移实验 (wound assay) 与染色细胞显微图像的结构化信息和基础分析算法.
//!
//! 该 crate 目前仅提供 `safe` 接口. 整条流水线为单线程同步设计:
//! 每个 analyzer 实例只持有一张图像, 每次 `apply` 都从不可变原图出发重新计算,
//! 不同图像之间不共享任何可变状态 (因此批处理可以安全地逐图并行).
//!
//! # 注意
//!
//! 1. 该 crate 只负责已解码像素缓冲之后的分析部分. 文件对话框, 图表渲染,
//!   报告落盘等属于外部协作者.
//! 2. 在非期望情况下, 程序会直接 panic, 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### 通道提取与光度校正 ✅
//!
//! 反色, 亮度/对比度缩放, 高斯模糊, 自适应直方图均衡.
//!
//! 实现位于 `assay-berry/src/correct.rs` 和 `assay-berry/src/filters`.
//!
//! ### 阈值选择 (Mean / Otsu / Minimum) ✅
//!
//! 含 dtype 感知的百分比偏移语义: 布尔/浮点域直接加 `offset/100`,
//! B 位无符号整数域加 `round(offset × 2^B / 100)`. 两条分支不可合并.
//!
//! 实现位于 `assay-berry/src/threshold.rs`.
//!
//! ### 二值化 (Borders / Contrast / Contrast-positive) ✅
//!
//! 比较方向以二值枚举表达, 不做自由字符串匹配.
//!
//! 实现位于 `assay-berry/src/binary.rs`.
//!
//! ### 伤口区域分割与统计 ✅
//!
//! 圆盘闭/开运算, 双极性小对象清理, 面积/平均宽度统计, 边缘叠加图.
//!
//! 实现位于 `assay-berry/src/wound.rs`.
//!
//! ### 细胞分水岭分割与计数 ✅
//!
//! 两次独立二值化 (种子掩膜 + 包含掩膜), 欧氏距离变换, 局部极大值标记,
//! 带分水岭线抑制的 marker watershed, 碎屑/细胞分类, confluence 统计.
//!
//! 实现位于 `assay-berry/src/cells`.
//!
//! ### 报告行构造与去重 ✅
//!
//! 仅当文件标识, 参数或统计与上一行不同时才追加新行.
//!
//! 实现位于 `assay-berry/src/report.rs`.
//!
//! ### 批处理 (feature `rayon`) ✅
//!
//! 逐图并行, 每个 worker 一个独立 analyzer.
//!
//! 实现位于 `assay-berry/src/batch.rs`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 高精度通用索引 / 向量.
#[allow(dead_code)]
type Idx2dF = (f64, f64);

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

/// 图像缓冲, 单通道平面与布尔掩膜等基础数据结构.
mod data;

pub use data::{
    AssayImage, Channel, CompactMask, CrossSection, ImgWriteRaw, ImgWriteVis, Mask, PixelDomain,
    Plane, Renderable,
};

#[cfg(feature = "plot")]
pub use data::ImgDisplay;

pub mod consts;

mod error;

pub use error::{AnalysisResult, AssayError, ConfigError, OpenError};

mod filters;

mod correct;

pub use correct::{correct, Corrected, CorrectionParams};

mod threshold;

pub use threshold::{threshold_of, ThresholdMethod};

mod binary;

pub use binary::{binarize, BinarizeMode, BinarizeParams, Binarized, Polarity};

pub mod wound;

pub use wound::{ConfluencyAnalyzer, WoundAnalyzer, WoundApply, WoundParams, WoundStat};

pub mod cells;

pub use cells::{CellAnalyzer, CellApply, CellParams, CellStat};

mod report;

pub use report::{Field, Report, ReportRow};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        pub mod batch;
    }
}

pub mod prelude;
