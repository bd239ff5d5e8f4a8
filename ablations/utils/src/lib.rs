//! 消融实验依赖的通用组件.

use assay_berry::{Channel, CorrectionParams};

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) {
    writeln!(&mut w, "{SEP}").unwrap();
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 创建一般情况下适合染色荧光图像的校正参数.
/// 取绿色通道, 其余档位保持恒等.
#[inline]
pub fn stained_correction() -> CorrectionParams {
    CorrectionParams {
        channel: Channel::Green,
        ..Default::default()
    }
}
