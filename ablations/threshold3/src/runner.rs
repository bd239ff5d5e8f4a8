//! 程序运行函数.

use crate::result::AblationResult;
use std::thread;
use utils::loader;

/// 实际运行.
pub fn run() -> AblationResult {
    let image_dir = loader::image_dir_from_env_or_home();
    assert!(image_dir.is_dir());
    let p = image_dir.as_path();

    // 短路判断
    assert!(
        loader::image_loader(p, false).next().is_some(),
        "Loading dataset config error"
    );

    println!("Running ablation studies...");
    thread::scope(|s| {
        use super::algos::*;

        let handles = [mean, otsu, minimum].map(|t| s.spawn(move || t(p)));

        AblationResult::from_iter(
            ["mean", "otsu", "minimum"].into_iter().zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
