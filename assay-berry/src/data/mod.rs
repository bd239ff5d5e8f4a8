//! 图像缓冲与派生数据结构.

use crate::error::{ConfigError, OpenError};
use crate::Idx2d;
use ndarray::{Array2, Array3};
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod iter;
mod mask;
mod plane;

pub use mask::{CompactMask, ImgWriteRaw, ImgWriteVis, Mask};

pub(crate) use mask::{disk_offsets, neighbour4, neighbour8};

pub use plane::{Histogram, PixelDomain, Plane};

#[cfg(feature = "plot")]
pub use mask::ImgDisplay;

/// 颜色通道.
///
/// 灰度图只有 `Bw` 通道; 彩色图的 `Bw` 请求会按既定策略被替换为 `Red`
/// (见 [`AssayImage::resolve_channel`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// 灰度 (单通道).
    Bw,

    /// 红色通道.
    Red,

    /// 绿色通道.
    Green,

    /// 蓝色通道.
    Blue,
}

impl Channel {
    /// 通道的展示名.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Bw => "BW",
            Channel::Red => "Red",
            Channel::Green => "Green",
            Channel::Blue => "Blue",
        }
    }

    /// 彩色图中该通道的平面下标. `Bw` 没有平面下标.
    fn rgb_index(&self) -> Option<usize> {
        match self {
            Channel::Bw => None,
            Channel::Red => Some(0),
            Channel::Green => Some(1),
            Channel::Blue => Some(2),
        }
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BW" => Ok(Channel::Bw),
            "Red" => Ok(Channel::Red),
            "Green" => Ok(Channel::Green),
            "Blue" => Ok(Channel::Blue),
            other => Err(ConfigError::UnknownChannel(other.to_string())),
        }
    }
}

/// 解码后的像素缓冲本体.
#[derive(Clone, Debug)]
enum SourcePixels {
    /// 单通道灰度.
    Gray(Array2<u8>),

    /// 三通道彩色, 形状为 (高, 宽, 3).
    Rgb(Array3<u8>),
}

/// 解码完成的源图像.
///
/// 图像在加载后不再修改; 所有校正/分割都产生新的数组,
/// 原图保留用于之后的叠加图合成. 每个 analyzer 实例独占一张源图像.
#[derive(Clone, Debug)]
pub struct AssayImage {
    path: PathBuf,
    data: SourcePixels,
}

impl AssayImage {
    /// 打开并解码本地图像文件 (JPEG/PNG 等).
    ///
    /// 解码失败时返回携带路径的 [`OpenError`], 流水线不会运行.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        let path = path.as_ref().to_owned();
        let decoded = image::open(&path).map_err(|source| OpenError {
            path: path.clone(),
            source,
        })?;

        let data = if decoded.color().has_color() {
            let rgb = decoded.to_rgb8();
            let (w, h) = rgb.dimensions();
            let arr = Array3::from_shape_vec((h as usize, w as usize, 3), rgb.into_raw())
                .expect("RGB 缓冲大小与分辨率不符");
            SourcePixels::Rgb(arr)
        } else {
            let gray = decoded.to_luma8();
            let (w, h) = gray.dimensions();
            let arr = Array2::from_shape_vec((h as usize, w as usize), gray.into_raw())
                .expect("灰度缓冲大小与分辨率不符");
            SourcePixels::Gray(arr)
        };

        Ok(Self { path, data })
    }

    /// 从已有的灰度缓冲直接构造 (不经过文件解码).
    pub fn from_gray(data: Array2<u8>) -> Self {
        Self {
            path: PathBuf::new(),
            data: SourcePixels::Gray(data),
        }
    }

    /// 从已有的三通道缓冲直接构造 (不经过文件解码).
    /// 形状必须为 (高, 宽, 3), 否则 panic.
    pub fn from_rgb(data: Array3<u8>) -> Self {
        let &[_, _, ch] = data.shape() else {
            unreachable!()
        };
        assert_eq!(ch, 3, "彩色缓冲必须是三通道");
        Self {
            path: PathBuf::new(),
            data: SourcePixels::Rgb(data),
        }
    }

    /// 源文件路径. 从内存缓冲构造的图像返回空路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 是否为单通道灰度图.
    #[inline]
    pub fn is_gray(&self) -> bool {
        matches!(self.data, SourcePixels::Gray(_))
    }

    /// 图像的分辨率 (高, 宽).
    pub fn shape(&self) -> Idx2d {
        match &self.data {
            SourcePixels::Gray(a) => {
                let &[h, w] = a.shape() else { unreachable!() };
                (h, w)
            }
            SourcePixels::Rgb(a) => {
                let &[h, w, _] = a.shape() else { unreachable!() };
                (h, w)
            }
        }
    }

    /// 图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 解析实际使用的通道.
    ///
    /// 1. 灰度图无论请求什么通道, 都解析为 `Bw`;
    /// 2. 彩色图请求 `Bw` 时, 解析为 `Red` (第一个平面).
    ///   这是有意保留的既定策略, 彩色图不做真正的灰度归约.
    pub fn resolve_channel(&self, requested: Channel) -> Channel {
        if self.is_gray() {
            Channel::Bw
        } else if requested == Channel::Bw {
            Channel::Red
        } else {
            requested
        }
    }

    /// 提取 `channel` 对应的单通道平面副本.
    ///
    /// `channel` 必须是 [`Self::resolve_channel`] 的输出, 否则 panic.
    pub fn channel_plane(&self, channel: Channel) -> Array2<u8> {
        match &self.data {
            SourcePixels::Gray(a) => {
                debug_assert_eq!(channel, Channel::Bw);
                a.clone()
            }
            SourcePixels::Rgb(a) => {
                let idx = channel
                    .rgb_index()
                    .expect("彩色图的通道必须先经过 resolve_channel");
                a.index_axis(ndarray::Axis(2), idx).to_owned()
            }
        }
    }

    /// 获得原图的三通道副本, 用于叠加图合成.
    /// 灰度图会被堆叠为三个相同的平面.
    pub fn original_rgb(&self) -> Array3<u8> {
        match &self.data {
            SourcePixels::Gray(a) => {
                let (h, w) = self.shape();
                Array3::from_shape_fn((h, w, 3), |(i, j, _)| a[(i, j)])
            }
            SourcePixels::Rgb(a) => a.clone(),
        }
    }
}

/// 阈值横截面: 预二值化信号的某一行与所用阈值, 供外部图表渲染.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossSection {
    /// 截取的图像行号.
    pub row: usize,

    /// 该行的预二值化信号.
    pub signal: Vec<f64>,

    /// 二值化所用的阈值.
    pub threshold: f64,
}

/// 可交给外部展示层直接渲染的对象.
#[derive(Clone, Debug)]
pub enum Renderable {
    /// 单通道灰度图.
    Gray(Array2<u8>),

    /// 三通道彩色图.
    Rgb(Array3<u8>),

    /// 横截面图表数据.
    CrossSection(CrossSection),
}

/// 将灰度平面提升为三通道, 并在 `row` 行处画出宽 `line_width` 的标记色带.
///
/// 色带超出图像上下边缘的部分会被裁掉. 偶数宽度会被圆整为奇数以保持居中.
pub(crate) fn banded_rgb(
    plane: &Array2<u8>,
    row: usize,
    line_width: usize,
    color: [u8; 3],
) -> Array3<u8> {
    let &[h, w] = plane.shape() else {
        unreachable!()
    };
    let mut ans = Array3::from_shape_fn((h, w, 3), |(i, j, _)| plane[(i, j)]);

    let half = line_width / 2;
    let start = row.saturating_sub(half);
    let end = usize::min(row + half + 1, h);
    for i in start..end {
        for j in 0..w {
            for (c, &v) in color.iter().enumerate() {
                ans[(i, j, c)] = v;
            }
        }
    }
    ans
}

/// 将 `border` 掩膜的前景位置以 `color` 画在 `base` 上.
pub(crate) fn paint_border(base: &mut Array3<u8>, border: &Mask, color: [u8; 3]) {
    for (pos, _) in border.indexed_iter().filter(|(_, &pix)| pix) {
        for (c, &v) in color.iter().enumerate() {
            base[(pos.0, pos.1, c)] = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_channel_policy_gray_forces_bw() {
        let img = AssayImage::from_gray(Array2::zeros((4, 4)));
        for requested in [Channel::Bw, Channel::Red, Channel::Green, Channel::Blue] {
            assert_eq!(img.resolve_channel(requested), Channel::Bw);
        }
    }

    #[test]
    fn test_channel_policy_rgb_bw_becomes_red() {
        let img = AssayImage::from_rgb(Array3::zeros((4, 4, 3)));
        assert_eq!(img.resolve_channel(Channel::Bw), Channel::Red);
        assert_eq!(img.resolve_channel(Channel::Green), Channel::Green);
    }

    #[test]
    fn test_channel_plane_extracts_requested_plane() {
        let mut rgb = Array3::zeros((2, 2, 3));
        rgb[(0, 0, 1)] = 77u8;
        let img = AssayImage::from_rgb(rgb);
        let green = img.channel_plane(Channel::Green);
        assert_eq!(green[(0, 0)], 77);
        assert_eq!(green[(1, 1)], 0);
    }

    #[test]
    fn test_unknown_channel_name_is_config_error() {
        use crate::error::ConfigError;
        assert_eq!(
            "Cyan".parse::<Channel>(),
            Err(ConfigError::UnknownChannel("Cyan".to_string()))
        );
        assert_eq!("Green".parse::<Channel>(), Ok(Channel::Green));
    }

    #[test]
    fn test_banded_rgb_clips_at_image_edge() {
        let plane = Array2::from_elem((6, 3), 10u8);
        let banded = banded_rgb(&plane, 0, 11, [255, 0, 0]);
        // 色带被裁到 [0, 6) 内.
        assert_eq!(banded[(0, 0, 0)], 255);
        assert_eq!(banded[(5, 0, 0)], 255);
        let banded = banded_rgb(&plane, 5, 3, [255, 0, 0]);
        assert_eq!(banded[(3, 0, 0)], 10);
        assert_eq!(banded[(4, 0, 0)], 255);
    }
}
