//! 图像的持久化存储.

use super::Mask;
use crate::consts::gray::{BLACK, WHITE};
use crate::data::Plane;
use image::ImageResult;
use ndarray::Array3;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好"
/// 的方式保存, 而不是 "as is" 的方式. 这意味着, 对于 [`Mask`]
/// 这类布尔图像, 前景/背景在保存时会映射为白色/黑色;
/// 对于浮点平面, 像素会被规范化到 8-bit 灰度范围.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 前景映射为白色, 背景映射为黑色.
impl ImgWriteVis for Mask {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in self.indexed_iter() {
            let gray = if pix { WHITE } else { BLACK };
            buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
        }
        buf.save(path)
    }
}

/// 按原样存储 (前景 1, 背景 0).
impl ImgWriteRaw for Mask {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in self.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, image::Luma([pix as u8]));
        }
        buf.save(path)
    }
}

/// 整数平面按原值存储; 浮点平面以 `[min, max]` 线性规范化到 8-bit.
impl ImgWriteVis for Plane {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        match self {
            Plane::U8(a) => {
                for ((h, w), &pix) in a.indexed_iter() {
                    buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                }
            }
            Plane::F64(a) => {
                let (min, max) = self.min_max().unwrap_or((0.0, 0.0));
                let span = if max > min { max - min } else { 1.0 };
                for ((h, w), &pix) in a.indexed_iter() {
                    let gray = ((pix - min) / span * 255.0) as u8;
                    buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
                }
            }
        }
        buf.save(path)
    }
}

/// 三通道叠加图按原样存储.
impl ImgWriteVis for Array3<u8> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let &[height, width, ch] = self.shape() else {
            unreachable!()
        };
        assert_eq!(ch, 3, "只支持三通道叠加图");
        let mut buf = image::RgbImage::new(width as u32, height as u32);
        for h in 0..height {
            for w in 0..width {
                let pix = [self[(h, w, 0)], self[(h, w, 1)], self[(h, w, 2)]];
                buf.put_pixel(w as u32, h as u32, image::Rgb(pix));
            }
        }
        buf.save(path)
    }
}
