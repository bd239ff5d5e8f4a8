//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx2d;

pub use crate::data::{
    AssayImage, Channel, CompactMask, CrossSection, ImgWriteRaw, ImgWriteVis, Mask, PixelDomain,
    Plane, Renderable,
};

#[cfg(feature = "plot")]
pub use crate::data::ImgDisplay;

pub use crate::binary::{binarize, BinarizeMode, BinarizeParams, Binarized, Polarity};
pub use crate::correct::{correct, Corrected, CorrectionParams};
pub use crate::error::{AnalysisResult, AssayError, ConfigError, OpenError};
pub use crate::threshold::{threshold_of, ThresholdMethod};

pub use crate::cells::{CellAnalyzer, CellApply, CellParams, CellStat};
pub use crate::wound::{
    ConfluencyAnalyzer, WoundAnalyzer, WoundApply, WoundParams, WoundStat,
};

pub use crate::report::{Report, ReportRow};

pub use crate::consts;
