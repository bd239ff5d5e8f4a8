//! marker 控制的分水岭分割.

use crate::data::{neighbour4, Mask};
use crate::Idx2d;
use binary_heap_plus::BinaryHeap;
use ndarray::Array2;

/// 像素的淹没状态.
#[derive(Copy, Clone, Eq, PartialEq)]
enum Flood {
    /// 尚未触达.
    Unseen,

    /// 已入队, 等待出队判定.
    Queued,

    /// 已定型 (拿到标签, 或被判为分水岭线 / 掩膜外).
    Settled,
}

/// 在引导面 `surface` 上从 `markers` 出发做 marker 控制的分水岭分割,
/// 生长范围被 `within` 掩膜约束.
///
/// 淹没从引导面的低处向高处推进 (引导面通常取距离变换的相反数).
/// 两个不同标签相遇处的像素被判为分水岭线并压为背景 0,
/// 因此相互接触的对象不会融合为同一个标签, 且分隔线本身不属于任何前景.
/// 同优先级的像素按入队次序出队, 结果在多次运行之间保持一致.
pub(crate) fn watershed(
    surface: &Array2<f64>,
    markers: &Array2<u32>,
    within: &Mask,
) -> Array2<u32> {
    let &[h, w] = surface.shape() else {
        unreachable!()
    };
    debug_assert_eq!((h, w), within.shape());

    let mut labels = Array2::<u32>::zeros((h, w));
    let mut state = Array2::from_elem((h, w), Flood::Unseen);

    // 堆顶为引导面最低 (最先淹没) 的像素; seq 保证同高度时先入先出.
    let mut heap: BinaryHeap<(f64, u64, Idx2d), _> =
        BinaryHeap::new_by(|a: &(f64, u64, Idx2d), b: &(f64, u64, Idx2d)| {
            b.0.total_cmp(&a.0).then(b.1.cmp(&a.1))
        });
    let mut seq = 0u64;

    let in_bounds = |p: Idx2d| p.0 < h && p.1 < w;

    // 种子像素直接定型; 其掩膜内邻居入队.
    for (pos, &lab) in markers.indexed_iter() {
        if lab == 0 {
            continue;
        }
        labels[pos] = lab;
        state[pos] = Flood::Settled;
    }
    for (pos, &lab) in markers.indexed_iter() {
        if lab == 0 {
            continue;
        }
        for neigh in neighbour4(pos) {
            if in_bounds(neigh) && within[neigh] && state[neigh] == Flood::Unseen {
                state[neigh] = Flood::Queued;
                heap.push((surface[neigh], seq, neigh));
                seq += 1;
            }
        }
    }

    while let Some((_, _, pos)) = heap.pop() {
        if state[pos] == Flood::Settled {
            continue;
        }
        state[pos] = Flood::Settled;

        // 已定型邻居携带的不同标签.
        let mut first_label = 0u32;
        let mut conflict = false;
        for neigh in neighbour4(pos) {
            if !in_bounds(neigh) {
                continue;
            }
            let lab = labels[neigh];
            if lab == 0 {
                continue;
            }
            if first_label == 0 {
                first_label = lab;
            } else if lab != first_label {
                conflict = true;
            }
        }

        if conflict || first_label == 0 {
            // 分水岭线: 两个集水盆相遇, 像素压为背景.
            continue;
        }
        labels[pos] = first_label;

        for neigh in neighbour4(pos) {
            if in_bounds(neigh) && within[neigh] && state[neigh] == Flood::Unseen {
                state[neigh] = Flood::Queued;
                heap.push((surface[neigh], seq, neigh));
                seq += 1;
            }
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::distance::distance_transform;
    use crate::cells::markers::find_markers;

    #[test]
    fn test_growth_is_bounded_by_mask() {
        // 单种子在 3×3 掩膜窗口内生长, 窗口外保持背景.
        let mut within = Mask::filled((7, 7), false);
        for i in 2..5 {
            for j in 2..5 {
                within[(i, j)] = true;
            }
        }
        let mut markers = Array2::<u32>::zeros((7, 7));
        markers[(3, 3)] = 1;
        let surface = Array2::<f64>::zeros((7, 7));

        let labels = watershed(&surface, &markers, &within);
        for ((i, j), &lab) in labels.indexed_iter() {
            if (2..5).contains(&i) && (2..5).contains(&j) {
                assert_eq!(lab, 1);
            } else {
                assert_eq!(lab, 0);
            }
        }
    }

    #[test]
    fn test_touching_blobs_split_with_suppressed_line() {
        // 两个相连的圆盘 (哑铃型): 分水岭把它们分成两个标签,
        // 相遇处的分隔线被压为背景.
        let mut m = Mask::filled((21, 31), false);
        for &(ch, cw) in &[(10usize, 10usize), (10, 20)] {
            for (dh, dw) in crate::data::disk_offsets(6) {
                let i = (ch as i32 + dh) as usize;
                let j = (cw as i32 + dw) as usize;
                m[(i, j)] = true;
            }
        }
        let dist = distance_transform(&m);
        let markers = find_markers(&dist, 5, 3);
        assert_eq!(markers.iter().copied().max().unwrap(), 2);

        let surface = dist.mapv(|v| -v);
        let labels = watershed(&surface, &markers, &m);

        // 两个标签都存在.
        assert!(labels.iter().any(|&l| l == 1));
        assert!(labels.iter().any(|&l| l == 2));
        // 不同标签的像素绝不 4-相邻 (中间必有分隔线).
        let &[h, w] = labels.shape() else {
            unreachable!()
        };
        for i in 0..h {
            for j in 0..w {
                let lab = labels[(i, j)];
                if lab == 0 {
                    continue;
                }
                for neigh in neighbour4((i, j)) {
                    if neigh.0 < h && neigh.1 < w {
                        let nl = labels[neigh];
                        assert!(nl == 0 || nl == lab);
                    }
                }
            }
        }
        // 掩膜外没有标签.
        for (pos, &pix) in m.indexed_iter() {
            if !pix {
                assert_eq!(labels[pos], 0);
            }
        }
    }
}
