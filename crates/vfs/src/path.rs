//! 路径切分
//!
//! 路径是绝对的、以 `/` 分隔、大小写敏感、逐段精确匹配的名字序列。
//! 切分采用分词语义：开头和重复的分隔符都被跳过，因此 `"///a//b/"` 与 `"/a/b"` 等价。
//! 这里不解释 `.` 与 `..`，它们和其它名字一样按字面匹配。
//!
//! 另外保留一种历史寻址形式 `设备名:路径/文件名`，见 [`split_device_path`]。

use alloc::string::String;
use alloc::vec::Vec;

/// 路径分隔符
pub const SEPARATOR: char = '/';

/// 将路径切分为非空的段
pub fn parse_path(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// 用分隔符重新拼接剩余段，不带前导分隔符
pub fn join_path(segments: &[&str]) -> String {
    segments.join("/")
}

/// 历史寻址形式 `device:residual/file` 的切分结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePath<'a> {
    /// 设备名
    pub device: &'a str,
    /// 设备内的目录部分
    pub residual: &'a str,
    /// 文件名；路径以分隔符结尾时为 `None`
    pub file: Option<&'a str>,
}

/// 切分 `device:residual/file` 形式的路径
///
/// 先按最后一个分隔符切出文件名，再在剩余部分中按第一个 `:` 切出设备名。
/// 没有分隔符或没有 `:` 时返回 `None`。
pub fn split_device_path(path: &str) -> Option<DevicePath<'_>> {
    let (container, file) = path.rsplit_once(SEPARATOR)?;
    let (device, residual) = container.split_once(':')?;
    Some(DevicePath {
        device,
        residual,
        file: (!file.is_empty()).then_some(file),
    })
}
