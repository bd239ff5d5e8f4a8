use crate::{Area2d, Areas2d, Idx2d};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::{Array2, ArrayView2};
use std::collections::{HashSet, VecDeque};
use std::io::{Read, Write};
use std::ops::{Index, IndexMut};

/// 获得 `(h, w)` 的 4-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour4((h, w): Idx2d) -> [Idx2d; 4] {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
}

/// 获得 `(h, w)` 的 8-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour8((h, w): Idx2d) -> [Idx2d; 8] {
    [
        (h.wrapping_sub(1), w.wrapping_sub(1)),
        (h.wrapping_sub(1), w),
        (h.wrapping_sub(1), w.saturating_add(1)),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
        (h.saturating_add(1), w.wrapping_sub(1)),
        (h.saturating_add(1), w),
        (h.saturating_add(1), w.saturating_add(1)),
    ]
}

/// 半径为 `radius` 的圆盘结构元的偏移集合.
///
/// 圆盘包括所有满足 `dh² + dw² <= radius²` 的整数偏移.
pub(crate) fn disk_offsets(radius: u32) -> Vec<(i32, i32)> {
    let r = radius as i32;
    let rr = r * r;
    let mut ans = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for dh in -r..=r {
        for dw in -r..=r {
            if dh * dh + dw * dw <= rr {
                ans.push((dh, dw));
            }
        }
    }
    ans
}

/// 拥有所有权的布尔掩膜.
///
/// 掩膜总是由一次二值化或形态学操作全新产生, 不在多次调用之间共享或原地修补.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mask {
    data: Array2<bool>,
}

impl Index<Idx2d> for Mask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for Mask {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 基础方法集合.
impl Mask {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<bool>) -> Self {
        Self { data }
    }

    /// 构造全为 `value` 的掩膜.
    #[inline]
    pub fn filled((h, w): Idx2d, value: bool) -> Self {
        Self {
            data: Array2::from_elem((h, w), value),
        }
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<bool> {
        self.data.view()
    }

    /// 掩膜的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let &[h, w] = self.data.shape() else {
            unreachable!()
        };
        (h, w)
    }

    /// 掩膜的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 掩膜的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 掩膜的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 前景 (`true`) 像素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&p| p).count()
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&bool> {
        self.data.get(pos)
    }

    /// 判断一个索引是否合法 (未越界).
    #[inline]
    pub fn check(&self, (h, w): Idx2d) -> bool {
        let (h_len, w_len) = self.shape();
        h < h_len && w < w_len
    }

    /// 以行优先规则, 获取能迭代所有 `(索引, 像素值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &bool)> {
        self.data.indexed_iter()
    }

    /// 以行优先规则, 获取能迭代掩膜所有索引的迭代器.
    #[inline]
    pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> {
        super::super::iter::PosIter::new(self.shape())
    }

    /// 就地取反.
    pub fn invert(&mut self) {
        for p in self.data.iter_mut() {
            *p = !*p;
        }
    }

    /// 获得取反的新掩膜.
    pub fn inverted(&self) -> Self {
        let mut ans = self.clone();
        ans.invert();
        ans
    }
}

/// 区域与形态学方法集合.
impl Mask {
    /// 按照 4-相邻规则获取所有值为 `target` 的区域. 两个像素 `p1` 和 `p2`
    /// 属于同一个区域, 当且仅当存在一条从 `p1` 到 `p2` 的 4-相邻路径,
    /// 且路径上的所有像素 (包括 `p1` 和 `p2`) 的值都为 `target`.
    pub fn areas(&self, target: bool) -> Areas2d {
        let mut ans = Areas2d::with_capacity(1);
        let mut bfs_q = VecDeque::with_capacity(4);
        let mut set = HashSet::with_capacity(16);

        for pos in self.pos_iter() {
            if set.contains(&pos) || self[pos] != target {
                continue;
            }
            bfs_q.push_back(pos);
            let mut this_area = Area2d::with_capacity(1);
            while let Some(cur_pos) = bfs_q.pop_front() {
                if set.contains(&cur_pos) {
                    continue;
                }
                set.insert(cur_pos);
                this_area.push(cur_pos);

                // bfs
                bfs_q.extend(
                    neighbour4(cur_pos)
                        .into_iter()
                        .filter(|p| self.check(*p) && self[*p] == target && !set.contains(p)),
                );
            }
            ans.push(this_area);
        }
        ans
    }

    /// 移除所有像素个数 **小于** `min_size` 的前景区域 (填充为背景).
    ///
    /// 返回被移除的区域个数. 全背景掩膜上该操作什么都不做.
    pub fn remove_small(&mut self, min_size: usize) -> usize {
        let mut removed = 0usize;
        for area in self.areas(true) {
            if area.len() < min_size {
                removed += 1;
                for pos in area {
                    self[pos] = false;
                }
            }
        }
        removed
    }

    /// 以半径为 `radius` 的圆盘结构元做膨胀.
    pub fn dilate_disk(&self, radius: u32) -> Self {
        self.dilate_by(&disk_offsets(radius))
    }

    /// 以半径为 `radius` 的圆盘结构元做腐蚀.
    ///
    /// 图像外被视为前景, 因此贴边的前景不会因为越界而被腐蚀掉.
    pub fn erode_disk(&self, radius: u32) -> Self {
        self.erode_by(&disk_offsets(radius))
    }

    /// 圆盘闭运算 (先膨胀后腐蚀). 填平小缺口.
    pub fn close_disk(&self, radius: u32) -> Self {
        let offsets = disk_offsets(radius);
        self.dilate_by(&offsets).erode_by(&offsets)
    }

    /// 圆盘开运算 (先腐蚀后膨胀). 削掉小突起.
    pub fn open_disk(&self, radius: u32) -> Self {
        let offsets = disk_offsets(radius);
        self.erode_by(&offsets).dilate_by(&offsets)
    }

    /// 以 `size × size` 的方形窗口做膨胀 (max-filter).
    ///
    /// 窗口偏移范围为 `[-size/2, (size-1)/2]`, 与常见 max-filter 的取整规则一致.
    pub fn dilate_square(&self, size: u32) -> Self {
        let s = size as i32;
        let (lo, hi) = (-(s / 2), (s - 1) / 2);
        let mut offsets = Vec::with_capacity((s * s) as usize);
        for dh in lo..=hi {
            for dw in lo..=hi {
                offsets.push((dh, dw));
            }
        }
        self.dilate_by(&offsets)
    }

    /// 提取边缘: 8-邻域中存在相异像素值的所有位置.
    ///
    /// 过渡带两侧的像素都会被标记, 与梯度响应的非零支撑一致.
    pub fn edges(&self) -> Self {
        let (h, w) = self.shape();
        let mut data = Array2::from_elem((h, w), false);
        for (pos, &pix) in self.indexed_iter() {
            let differs = neighbour8(pos)
                .into_iter()
                .filter(|p| self.check(*p))
                .any(|p| self[p] != pix);
            if differs {
                data[pos] = true;
            }
        }
        Self { data }
    }

    fn dilate_by(&self, offsets: &[(i32, i32)]) -> Self {
        let (h, w) = self.shape();
        let mut data = Array2::from_elem((h, w), false);
        for ((ph, pw), _) in self.indexed_iter().filter(|(_, &pix)| pix) {
            for &(dh, dw) in offsets {
                let nh = ph as i32 + dh;
                let nw = pw as i32 + dw;
                if nh >= 0 && nw >= 0 && (nh as usize) < h && (nw as usize) < w {
                    data[(nh as usize, nw as usize)] = true;
                }
            }
        }
        Self { data }
    }

    fn erode_by(&self, offsets: &[(i32, i32)]) -> Self {
        let (h, w) = self.shape();
        let mut data = Array2::from_elem((h, w), false);
        for ((ph, pw), _) in self.indexed_iter().filter(|(_, &pix)| pix) {
            let all_fg = offsets.iter().all(|&(dh, dw)| {
                let nh = ph as i32 + dh;
                let nw = pw as i32 + dw;
                if nh >= 0 && nw >= 0 && (nh as usize) < h && (nw as usize) < w {
                    self.data[(nh as usize, nw as usize)]
                } else {
                    // 图像外视为前景
                    true
                }
            });
            if all_fg {
                data[(ph, pw)] = true;
            }
        }
        Self { data }
    }
}

/// 压缩存储方法集合.
impl Mask {
    /// 压缩数据.
    pub fn compress(&self) -> CompactMask {
        let buf: Vec<u8> = self.data.iter().map(|&p| p as u8).collect();
        let mut e = ZlibEncoder::new(Vec::with_capacity(8), Compression::best());
        e.write_all(&buf).expect("Compression error");
        CompactMask {
            buf: e.finish().expect("Compression error"),
            sh: self.shape(),
        }
    }
}

/// 压缩存储的 [`Mask`]; 不透明类型.
///
/// 批处理需要在内存中同时保留大量掩膜时使用.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactMask {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状.
    sh: Idx2d,
}

impl CompactMask {
    /// 解压缩数据.
    pub fn decompress(self) -> Mask {
        let Self { buf, sh: (h, w) } = self;
        let mut d = ZlibDecoder::new(buf.as_slice());
        let mut buf = Vec::with_capacity(h * w);
        d.read_to_end(&mut buf).expect("Decompression error");
        debug_assert_eq!(buf.len(), h * w);
        let data = Array2::from_shape_vec((h, w), buf.into_iter().map(|p| p != 0).collect())
            .unwrap();
        Mask { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn cross() -> Mask {
        Mask::new(array![
            [false, true, false],
            [true, true, true],
            [false, true, false],
        ])
    }

    #[test]
    fn test_areas_four_adjacency() {
        let m = Mask::new(array![
            [true, false, true],
            [false, false, true],
            [true, false, false],
        ]);
        let areas = m.areas(true);
        assert_eq!(areas.len(), 3);
        let bg = m.areas(false);
        assert_eq!(bg.len(), 1);
    }

    #[test]
    fn test_remove_small_strictly_less() {
        let mut m = Mask::new(array![
            [true, false, true],
            [false, false, true],
            [false, false, false],
        ]);
        // 尺寸为 1 的区域被删, 尺寸为 2 的区域保留.
        m.remove_small(2);
        assert!(!m[(0, 0)]);
        assert!(m[(0, 2)] && m[(1, 2)]);
        assert_eq!(m.count(), 2);
    }

    #[test]
    fn test_remove_small_on_empty_mask_is_noop() {
        let mut m = Mask::filled((4, 4), false);
        assert_eq!(m.remove_small(10), 0);
        assert_eq!(m.count(), 0);
    }

    #[test]
    fn test_open_removes_single_pixel() {
        let mut m = Mask::filled((7, 7), false);
        m[(3, 3)] = true;
        let opened = m.open_disk(1);
        assert_eq!(opened.count(), 0);
    }

    #[test]
    fn test_close_fills_hole() {
        let mut m = Mask::filled((7, 7), true);
        m[(3, 3)] = false;
        let closed = m.close_disk(1);
        assert_eq!(closed.count(), 49);
    }

    #[test]
    fn test_close_open_idempotent_on_smooth_mask() {
        // 已被一轮闭/开平滑过的掩膜, 再跑一轮结果不变.
        let mut m = Mask::filled((11, 11), false);
        for pos in disk_offsets(3) {
            m[((5 + pos.0) as usize, (5 + pos.1) as usize)] = true;
        }
        let once = m.close_disk(1).open_disk(1);
        let twice = once.close_disk(1).open_disk(1);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_edges_marks_both_sides() {
        let m = cross();
        let e = m.edges();
        // 中心像素的 8-邻域含有背景, 也属于边缘.
        assert!(e[(1, 1)]);
        assert!(e[(0, 0)]);
    }

    #[test]
    fn test_degenerate_masks_do_not_panic() {
        for value in [false, true] {
            let m = Mask::filled((5, 5), value);
            let cleaned = m.close_disk(2).open_disk(2);
            assert_eq!(cleaned.count(), if value { 25 } else { 0 });
            assert_eq!(m.edges().count(), 0);
        }
    }

    #[test]
    fn test_compress_roundtrip() {
        let m = cross();
        let restored = m.compress().decompress();
        assert_eq!(m, restored);
    }
}
