//! 文件相关系统调用号
//!
//! 与历史跳转表保持一致：文件类调用占用 40..=44。

/// 打开文件，返回描述符
pub const SYS_FOPEN: usize = 40;
/// 关闭描述符
pub const SYS_FCLOSE: usize = 41;
/// 从描述符读取
pub const SYS_FREAD: usize = 42;
/// 向描述符写入
pub const SYS_FWRITE: usize = 43;
/// 查询文件元信息
pub const SYS_FINFO: usize = 44;
