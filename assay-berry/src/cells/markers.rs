//! 分水岭种子标记: 距离变换的局部极大值提取.

use crate::data::{disk_offsets, neighbour4};
use crate::Idx2d;
use ndarray::Array2;
use ordered_float::NotNan;
use std::collections::{HashSet, VecDeque};

/// 从距离变换提取分水岭种子标记.
///
/// 1. 候选: 距离为正, 且在半径为 `disk_radius` 的圆盘 footprint
///   内不小于任何邻居的位置 (允许平台);
/// 2. 抑制: 按距离值从大到小贪心保留, 丢弃与已保留点欧氏距离小于
///   `min_distance` 的候选;
/// 3. 将保留下来的标记像素按 4-相邻规则编号为 1 起的整数种子.
///
/// 返回与距离图同形状的标记图, 0 代表非标记.
pub(crate) fn find_markers(dist: &Array2<f64>, min_distance: u32, disk_radius: u32) -> Array2<u32> {
    let &[h, w] = dist.shape() else {
        unreachable!()
    };
    let footprint = disk_offsets(disk_radius);

    // 候选峰.
    let mut peaks: Vec<(Idx2d, f64)> = Vec::new();
    for i in 0..h {
        for j in 0..w {
            let v = dist[(i, j)];
            if v <= 0.0 {
                continue;
            }
            let is_max = footprint.iter().all(|&(dh, dw)| {
                let ni = i as i64 + dh as i64;
                let nj = j as i64 + dw as i64;
                if ni < 0 || nj < 0 || ni >= h as i64 || nj >= w as i64 {
                    return true;
                }
                dist[(ni as usize, nj as usize)] <= v
            });
            if is_max {
                peaks.push(((i, j), v));
            }
        }
    }

    // 从大到小排序; 同值之间按索引保证稳定性.
    peaks.sort_by_key(|&(pos, v)| (std::cmp::Reverse(NotNan::new(v).unwrap()), pos));

    // 最小间隔抑制.
    let min_sq = (min_distance as f64) * (min_distance as f64);
    let mut kept: Vec<Idx2d> = Vec::with_capacity(peaks.len());
    for (pos, _) in peaks {
        let far_enough = kept.iter().all(|&(kh, kw)| {
            let dh = pos.0.abs_diff(kh) as f64;
            let dw = pos.1.abs_diff(kw) as f64;
            dh * dh + dw * dw >= min_sq
        });
        if far_enough {
            kept.push(pos);
        }
    }

    // 4-相邻编组, 种子号从 1 开始.
    let kept_set: HashSet<Idx2d> = kept.iter().copied().collect();
    let mut markers = Array2::<u32>::zeros((h, w));
    let mut next_label = 0u32;
    let mut q = VecDeque::with_capacity(4);
    for pos in kept {
        if markers[pos] != 0 {
            continue;
        }
        next_label += 1;
        q.push_back(pos);
        while let Some(cur) = q.pop_front() {
            if markers[cur] != 0 {
                continue;
            }
            markers[cur] = next_label;
            q.extend(
                neighbour4(cur)
                    .into_iter()
                    .filter(|p| kept_set.contains(p) && p.0 < h && p.1 < w && markers[*p] == 0),
            );
        }
    }
    markers
}

/// 标记图中的最大种子号 (种子个数).
pub(crate) fn marker_count(markers: &Array2<u32>) -> u32 {
    markers.iter().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::distance::distance_transform;
    use crate::data::Mask;

    #[test]
    fn test_no_foreground_yields_no_markers() {
        let d = Array2::<f64>::zeros((8, 8));
        let markers = find_markers(&d, 3, 3);
        assert_eq!(marker_count(&markers), 0);
    }

    #[test]
    fn test_two_separated_blobs_give_two_seeds() {
        let mut m = Mask::filled((40, 40), false);
        for &(ch, cw) in &[(10usize, 10usize), (30, 30)] {
            for (dh, dw) in disk_offsets(5) {
                m[((ch as i32 + dh) as usize, (cw as i32 + dw) as usize)] = true;
            }
        }
        let d = distance_transform(&m);
        let markers = find_markers(&d, 3, 3);
        assert_eq!(marker_count(&markers), 2);
        // 两个种子分别落在各自圆盘内.
        let mut seen = [false; 2];
        for ((i, j), &lab) in markers.indexed_iter() {
            if lab > 0 {
                let near_first = (i.abs_diff(10).pow(2) + j.abs_diff(10).pow(2)) <= 25;
                let near_second = (i.abs_diff(30).pow(2) + j.abs_diff(30).pow(2)) <= 25;
                assert!(near_first || near_second);
                seen[(lab - 1) as usize] = true;
            }
        }
        assert!(seen[0] && seen[1]);
    }

    #[test]
    fn test_min_distance_suppresses_close_peaks() {
        // 同一水平条带内距离值相同的平台: 大间隔要求下只留一个种子.
        let m = Mask::new(Array2::from_shape_fn((9, 30), |(i, _)| (3..6).contains(&i)));
        let d = distance_transform(&m);
        let markers = find_markers(&d, 100, 2);
        assert_eq!(marker_count(&markers), 1);
    }
}
