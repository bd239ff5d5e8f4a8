//! 批处理: 对一组图像文件逐图并行地运行完整流水线.
//!
//! 每个 worker 独立构造自己的 analyzer, 不同图像之间没有任何共享可变状态,
//! 因此无需加锁. 结果顺序与输入路径顺序一致.
//!
//! # 注意
//!
//! 需要 `rayon` feature.

use crate::cells::{CellAnalyzer, CellApply};
use crate::error::AssayError;
use crate::report::ReportRow;
use crate::wound::{WoundAnalyzer, WoundApply};
use rayon::prelude::*;
use std::path::PathBuf;

/// 以伤口流水线处理 `paths` 中的每个文件, 返回与输入同序的报告行.
///
/// 单个文件的打开/配置错误只影响该文件自己的结果槽位.
pub fn wound_rows(paths: &[PathBuf], params: &WoundApply) -> Vec<Result<ReportRow, AssayError>> {
    paths
        .par_iter()
        .map(|path| {
            let mut analyzer = WoundAnalyzer::load(path)?;
            analyzer.apply(params)?;
            Ok(analyzer.report_row().expect("成功的 apply 必有报告行"))
        })
        .collect()
}

/// 以细胞计数流水线处理 `paths` 中的每个文件, 返回与输入同序的报告行.
pub fn cell_rows(paths: &[PathBuf], params: &CellApply) -> Vec<Result<ReportRow, AssayError>> {
    paths
        .par_iter()
        .map(|path| {
            let mut analyzer = CellAnalyzer::load(path)?;
            analyzer.apply(params)?;
            Ok(analyzer.report_row().expect("成功的 apply 必有报告行"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AssayImage;
    use ndarray::Array2;
    use std::sync::mpsc;

    /// 上亮下暗的合成图, 写到临时 PNG 文件.
    fn write_sample(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(name);
        let buf = image::GrayImage::from_fn(64, 48, |_, y| {
            image::Luma([if y < 24 { 220u8 } else { 30 }])
        });
        buf.save(&path).unwrap();
        path
    }

    #[test]
    fn test_batch_preserves_order_and_isolates_errors() {
        let good = write_sample("assay_berry_batch_ok.png");
        let missing = PathBuf::from("/nonexistent/assay_berry_missing.png");
        let rows = wound_rows(&[good.clone(), missing, good.clone()], &WoundApply::default());

        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(AssayError::Open(_))));
        assert!(rows[2].is_ok());
        // 同一文件同一参数: 两行完全一致.
        assert_eq!(rows[0].as_ref().unwrap(), rows[2].as_ref().unwrap());

        std::fs::remove_file(good).ok();
    }

    #[test]
    fn test_threadpool_analyzers_are_independent() {
        // 每个 worker 一个独立 analyzer, 并行结果与串行结果逐位一致.
        let make_image = |seed: u8| {
            AssayImage::from_gray(Array2::from_shape_fn((40, 40), |(i, j)| {
                ((i * 7 + j * 3) as u8).wrapping_add(seed)
            }))
        };

        let serial: Vec<_> = (0..8u8)
            .map(|s| {
                let mut analyzer = WoundAnalyzer::new(make_image(s));
                analyzer.apply(&WoundApply::default()).unwrap();
                analyzer.stat().unwrap()
            })
            .collect();

        let pool = threadpool::ThreadPool::new(usize::max(2, num_cpus::get()));
        let (tx, rx) = mpsc::channel();
        for s in 0..8u8 {
            let tx = tx.clone();
            pool.execute(move || {
                let mut analyzer = WoundAnalyzer::new(make_image(s));
                analyzer.apply(&WoundApply::default()).unwrap();
                tx.send((s as usize, analyzer.stat().unwrap())).unwrap();
            });
        }
        drop(tx);

        let mut parallel = vec![None; 8];
        for (idx, stat) in rx {
            parallel[idx] = Some(stat);
        }
        for (a, b) in serial.iter().zip(parallel.iter()) {
            assert_eq!(*a, b.unwrap());
        }
    }
}
