//! 通道提取与光度校正.

use crate::data::{AssayImage, Channel};
use crate::filters::{equalize_adapthist, gaussian_blur};
use ndarray::Array2;

/// 自适应均衡的对比度裁剪系数.
const CLIP_LIMIT: f64 = 0.01;

/// 光度校正参数.
///
/// 参数在单次调用内不可变; 重新提供参数会让整条校正链从原始缓冲重新运行,
/// 校正结果从不做增量修补.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorrectionParams {
    /// 请求的颜色通道. 实际使用的通道见 [`Corrected::channel`].
    pub channel: Channel,

    /// 亮度缩放系数 (>= 0). 1.0 为恒等.
    pub brightness: f64,

    /// 对比度缩放系数 (带符号). 1.0 为恒等.
    pub contrast: f64,

    /// 高斯模糊半径 (>= 0). 0 为恒等.
    pub blur_radius: f64,

    /// 是否做自适应直方图均衡.
    pub equalize: bool,

    /// 是否先做反色.
    pub invert: bool,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            channel: Channel::Bw,
            brightness: 1.0,
            contrast: 1.0,
            blur_radius: 0.0,
            equalize: false,
            invert: false,
        }
    }
}

impl CorrectionParams {
    /// 亮度/对比度/模糊是否全部处于恒等档位.
    ///
    /// 恒等档位下这三步被整体跳过 (纯 no-op),
    /// 但反色与均衡 (若请求) 依然生效.
    #[inline]
    fn is_bcb_noop(&self) -> bool {
        self.brightness == 1.0 && self.contrast == 1.0 && self.blur_radius == 0.0
    }
}

/// 校正结果: 新的单通道平面与实际使用的通道.
#[derive(Clone, Debug)]
pub struct Corrected {
    /// 校正后的平面. 原始缓冲保持不变.
    pub plane: Array2<u8>,

    /// 实际使用的通道 (经过通道解析策略).
    pub channel: Channel,
}

/// 反色.
fn invert(plane: &mut Array2<u8>) {
    for p in plane.iter_mut() {
        *p = u8::MAX - *p;
    }
}

/// 亮度缩放: `v * factor`, 截断到 8-bit 范围.
fn scale_brightness(plane: &mut Array2<u8>, factor: f64) {
    for p in plane.iter_mut() {
        *p = (*p as f64 * factor).round().clamp(0.0, 255.0) as u8;
    }
}

/// 对比度缩放: 以全图平均灰度为支点, `mean + (v - mean) * factor`.
fn scale_contrast(plane: &mut Array2<u8>, factor: f64) {
    let sum: u64 = plane.iter().map(|&p| p as u64).sum();
    let n = plane.len();
    if n == 0 {
        return;
    }
    // 支点取整, 与常见图像增强实现一致.
    let mean = (sum as f64 / n as f64 + 0.5).floor();
    for p in plane.iter_mut() {
        *p = (mean + (*p as f64 - mean) * factor)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
}

/// 运行完整的校正链: 通道提取 → 反色 → 亮度 → 对比度 → 高斯模糊 → 自适应均衡.
///
/// 顺序固定. 亮度/对比度/模糊全为恒等档位时整体跳过;
/// 均衡结果重新缩放回原 8-bit 整数域.
pub fn correct(img: &AssayImage, p: &CorrectionParams) -> Corrected {
    let channel = img.resolve_channel(p.channel);
    let mut plane = img.channel_plane(channel);

    if p.invert {
        invert(&mut plane);
    }
    if !p.is_bcb_noop() {
        scale_brightness(&mut plane, p.brightness);
        scale_contrast(&mut plane, p.contrast);
        if p.blur_radius > 0.0 {
            plane = gaussian_blur(&plane, p.blur_radius);
        }
    }
    if p.equalize {
        plane = equalize_adapthist(&plane, CLIP_LIMIT);
    }

    Corrected { plane, channel }
}
