//! 布尔掩膜对象的操作.

mod core;
mod save;

pub use self::core::{CompactMask, Mask};

pub(crate) use self::core::{disk_offsets, neighbour4, neighbour8};

pub use save::{ImgWriteRaw, ImgWriteVis};

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        mod plot;

        pub use plot::ImgDisplay;
    }
}
