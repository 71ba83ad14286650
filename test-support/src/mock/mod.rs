//! Mock 实现模块
//!
//! 提供架构和 VFS 运行时的 Mock 实现，用于测试

pub mod arch;
pub mod vfs;
