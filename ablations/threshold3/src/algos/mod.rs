mod profile;

use assay_berry::prelude::*;
use std::path::Path;
use utils::loader;

pub use profile::Profile;

/// 以指定阈值方法跑完整的伤口流水线, 并累计统计.
fn run_with_method(name: &str, method: ThresholdMethod, p: &Path) -> Profile {
    let mut profile = Profile::new();
    let params = WoundApply {
        binarize: BinarizeParams {
            method,
            ..Default::default()
        },
        ..Default::default()
    };

    for img_path in loader::image_loader(p, false) {
        let mut analyzer = match WoundAnalyzer::load(&img_path) {
            Ok(a) => a,
            Err(e) => {
                log::warn!("{name}: {e}");
                profile.count_trivial();
                continue;
            }
        };
        println!("{name}: file {}...", img_path.display());

        profile.count_target(true);
        analyzer.apply(&params).unwrap();
        profile.target_elapsed();

        let mask = analyzer.final_mask().unwrap();
        profile.count_foreground(mask.count() as u64);
    }
    profile.finish()
}

pub fn mean(p: &Path) -> Profile {
    run_with_method("Mean", ThresholdMethod::Mean, p)
}

pub fn otsu(p: &Path) -> Profile {
    run_with_method("Otsu", ThresholdMethod::Otsu, p)
}

pub fn minimum(p: &Path) -> Profile {
    run_with_method("Minimum", ThresholdMethod::Minimum, p)
}
