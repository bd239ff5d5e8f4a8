//! 图片展示模块, 主要用于调试.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use super::Mask;
use crate::consts::gray::{BLACK, WHITE};
use crate::data::Plane;
use opencv::highgui::{imshow, wait_key};
use opencv::prelude::Mat;
use std::time::Duration;

/// 表明一个可以在窗口中可视化的对象.
pub trait ImgDisplay {
    /// 展示对象.
    fn show(&self);

    /// 同 `show()`, 但在之后自动等待一次用户按键输入.
    fn show_and_wait(&self) {
        self.show();
        wait_key(0).unwrap(); // never fails
    }

    /// 同 `show()`, 但在之后自动等待给定时间.
    fn show_and_wait_for(&self, d: Duration) -> opencv::Result<i32> {
        self.show();
        let ms = d.as_millis();
        assert!(ms <= i32::MAX as u128);
        wait_key(ms as i32)
    }
}

/// 将单通道字节流按行优先格式, 以 `(h, w)` 分辨率存储为矩阵.
fn gray_to_opencv_mat(data: &[u8], (h, w): (usize, usize)) -> Mat {
    assert_eq!(data.len(), h * w);
    Mat::from_slice_rows_cols(data, h, w).unwrap()
}

/// 前景展示为白色, 背景展示为黑色.
impl ImgDisplay for Mask {
    fn show(&self) {
        let buf: Vec<u8> = self
            .array_view()
            .iter()
            .map(|&p| if p { WHITE } else { BLACK })
            .collect();
        let mat = gray_to_opencv_mat(&buf, self.shape());
        imshow("Image", &mat).unwrap();
    }
}

/// 整数平面按原值展示; 浮点平面以 `[min, max]` 线性规范化后展示.
impl ImgDisplay for Plane {
    fn show(&self) {
        let buf: Vec<u8> = match self {
            Plane::U8(a) => a.iter().copied().collect(),
            Plane::F64(_) => {
                let (min, max) = self.min_max().unwrap_or((0.0, 0.0));
                let span = if max > min { max - min } else { 1.0 };
                self.iter_f64()
                    .map(|p| ((p - min) / span * 255.0) as u8)
                    .collect()
            }
        };
        let mat = gray_to_opencv_mat(&buf, self.shape());
        imshow("Image", &mat).unwrap();
    }
}
