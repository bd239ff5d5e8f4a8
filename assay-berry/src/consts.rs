//! 通用常量.

/// 三通道颜色.
pub mod rgb {
    /// 叠加图边框的默认颜色 (红).
    pub const RED: [u8; 3] = [255, 0, 0];

    /// 三通道绿色.
    pub const GREEN: [u8; 3] = [0, 255, 0];

    /// 三通道蓝色.
    pub const BLUE: [u8; 3] = [0, 0, 255];

    /// 三通道黑色.
    pub const BLACK: [u8; 3] = [0, 0, 0];

    /// 三通道白色.
    pub const WHITE: [u8; 3] = [255, 255, 255];
}

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;
}

/// 偏移百分比的合法下界.
pub const OFFSET_PERCENT_MIN: f64 = -50.0;

/// 偏移百分比的合法上界.
pub const OFFSET_PERCENT_MAX: f64 = 50.0;

/// 划痕实验的默认参数集.
///
/// 数值与桌面端各参数面板的默认档位保持一致.
pub mod wound_defaults {
    /// 默认对比度缩放.
    pub const CONTRAST: f64 = 1.2;

    /// 默认高斯模糊半径.
    pub const BLUR_RADIUS: f64 = 1.0;

    /// 默认圆盘结构元半径.
    pub const DISK_RADIUS: u32 = 6;

    /// 伤口内部允许的最小对象尺寸 (占全图百分比).
    pub const MIN_OBJECTS_PERCENT: f64 = 7.0;

    /// 允许的最小伤口碎片尺寸 (占全图百分比).
    pub const MIN_WOUND_PERCENT: f64 = 1.5;

    /// 默认边框宽度 (像素).
    pub const BORDER_SIZE: u32 = 3;
}

/// 细胞计数的默认参数集.
pub mod cell_defaults {
    /// 种子掩膜的默认二值化偏移.
    pub const SEED_OFFSET_PERCENT: f64 = 0.0;

    /// 包含掩膜的默认二值化偏移.
    pub const CONTAIN_OFFSET_PERCENT: f64 = 0.0;

    /// 局部极大值之间的最小间隔 (像素).
    pub const MIN_DISTANCE: u32 = 3;

    /// 局部极大值 footprint 的圆盘半径.
    pub const DISK_RADIUS: u32 = 3;

    /// 区分细胞与碎屑的尺寸门限 (像素个数).
    pub const SIZE_THRESHOLD: f64 = 25.0;

    /// 默认边框宽度 (像素).
    pub const BORDER_SIZE: u32 = 1;
}

/// 细胞铺满度 (confluency) 实验的默认参数集.
pub mod confluency_defaults {
    /// 默认对比度缩放.
    pub const CONTRAST: f64 = 1.2;

    /// 默认高斯模糊半径.
    pub const BLUR_RADIUS: f64 = 1.0;

    /// 默认圆盘结构元半径.
    pub const DISK_RADIUS: u32 = 3;

    /// 空隙内部允许的最小对象尺寸 (占全图百分比).
    pub const MIN_OBJECTS_PERCENT: f64 = 0.05;

    /// 允许的最小空隙碎片尺寸 (占全图百分比).
    pub const MIN_FREE_PERCENT: f64 = 0.1;

    /// 默认边框宽度 (像素).
    pub const BORDER_SIZE: u32 = 1;
}
