//! 阈值选择器消融实验: 在同一批划痕图像上比较
//! Mean / Otsu / Minimum 三种阈值方法的耗时与分割结果.

mod algos;
mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let result = runner::run();
    result.analyze();
}
