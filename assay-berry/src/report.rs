//! 分析报告行的构造与累积.
//!
//! 核心只负责产出格式良好的行; 落盘 (CSV 等) 由外部协作者完成.

/// 报告行中的一个键值对. 键为固定的列名.
pub type Field = (&'static str, String);

/// 将统计值格式化为报告单元格. NaN 渲染为字面量 `NaN` 哨兵.
pub(crate) fn fmt_f64(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v}")
    }
}

/// 一行分析报告: 文件标识 + 本次调用的全部参数 + 全部统计值.
///
/// 列名是编译期固定的字符串, 因此只支持序列化输出, 不支持反序列化.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReportRow {
    /// 输入文件标识.
    pub file: String,

    /// 参数与统计键值对, 保持插入顺序.
    pub fields: Vec<Field>,
}

impl ReportRow {
    /// 组装一行报告.
    pub fn new(file: String, fields: Vec<Field>) -> Self {
        Self { file, fields }
    }

    /// 两行是否逐键逐值完全相同.
    pub fn identical(&self, other: &Self) -> bool {
        self == other
    }

    /// 本行的列名序列 (含文件标识列).
    pub fn header(&self) -> Vec<&'static str> {
        let mut ans = Vec::with_capacity(self.fields.len() + 1);
        ans.push("file");
        ans.extend(self.fields.iter().map(|(k, _)| *k));
        ans
    }
}

/// 累积的分析报告. 每张已处理图像对应一行.
///
/// 行只在与上一行不同时才被追加 (去重策略);
/// 失败的 `apply` 不会产出新行, 已累积的行保持原样.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Report {
    rows: Vec<ReportRow>,
}

impl Report {
    /// 初始化空报告.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 已累积的行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 报告是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 获得全部行.
    #[inline]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// 清空报告.
    #[inline]
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// 报告的列名序列. 空报告返回 `None`.
    pub fn header(&self) -> Option<Vec<&'static str>> {
        self.rows.first().map(ReportRow::header)
    }

    /// 追加一行, 但与上一行逐键逐值相同时跳过 (去重).
    ///
    /// 返回是否实际追加了新行.
    pub fn push_dedup(&mut self, row: ReportRow) -> bool {
        if let Some(last) = self.rows.last() {
            if last.identical(&row) {
                return false;
            }
        }
        self.rows.push(row);
        true
    }
}
