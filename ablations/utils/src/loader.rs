//! 图像数据集加载器. 提供迭代器风格的文件获取模式.

use std::env;
use std::path::{Path, PathBuf};

/// 加载器接受的图像扩展名 (不区分大小写).
pub const IMG_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 获取实验图像基本路径.
///
/// 1. 若环境变量 `$ASSAY_IMAGE_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/assay-images`.
pub fn image_dir_from_env_or_home() -> PathBuf {
    if let Ok(d) = env::var("ASSAY_IMAGE_DIR") {
        PathBuf::from(d)
    } else {
        let mut ans = dirs::home_dir().expect("无法定位 home 目录");
        ans.push("assay-images");
        ans
    }
}

/// 从指定目录创建图像文件加载器.
///
/// # 注意
///
/// 1. `path` 必须是目录, 否则程序 panic.
/// 2. `recursive` 为 `true` 时会深入子目录.
/// 3. 迭代顺序在同一目录内按文件名升序, 保证多次运行结果一致.
pub fn image_loader<P: AsRef<Path>>(path: P, recursive: bool) -> ImageLoader {
    let path = path.as_ref();
    assert!(path.is_dir());

    let mut loader = ImageLoader {
        pending: Vec::with_capacity(16),
        recursive,
    };
    loader.push_dir(path);
    loader
}

/// 从 `$ASSAY_IMAGE_DIR` 或者 `$HOME/assay-images` 下创建图像文件加载器.
#[inline]
pub fn image_loader_from_env_or_home(recursive: bool) -> ImageLoader {
    image_loader(image_dir_from_env_or_home(), recursive)
}

/// 图像文件加载器, 在内部自动过滤扩展名.
#[derive(Debug)]
pub struct ImageLoader {
    /// 待访问的路径栈 (目录或文件), 栈顶优先.
    pending: Vec<PathBuf>,
    recursive: bool,
}

impl ImageLoader {
    /// 判断一个路径是否带有可接受的图像扩展名.
    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                IMG_EXTENSIONS
                    .iter()
                    .any(|accept| accept.eq_ignore_ascii_case(e))
            })
    }

    /// 将目录的子项按文件名降序压栈 (弹出时即为升序).
    fn push_dir(&mut self, dir: &Path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let mut children: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        children.sort();
        children.reverse();
        self.pending.extend(children);
    }
}

impl Iterator for ImageLoader {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.pending.pop() {
            if path.is_dir() {
                if self.recursive {
                    self.push_dir(&path);
                }
                continue;
            }
            if Self::is_image(&path) {
                return Some(path);
            }
        }
        None
    }
}
