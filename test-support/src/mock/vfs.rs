//! VFS 相关操作的 Mock 实现
//!
//! 注意：这里不直接依赖 `vfs` crate（避免循环依赖）。
//! `vfs` crate 在 `cfg(test)` 下为这些类型实现其 trait（例如 `VfsOps`）。

use core::sync::atomic::{AtomicUsize, Ordering};

/// Mock 的 VFS 操作
///
/// 默认所有非空地址范围都视为合法的用户缓冲区；可以拒绝一段指定范围来模拟越界指针。
pub struct MockVfsOps {
    denied_start: AtomicUsize,
    denied_len: AtomicUsize,
    /// 当前处于用户访问模式的嵌套层数
    pub user_access_depth: AtomicUsize,
    /// 累计进入用户访问模式的次数
    pub user_access_count: AtomicUsize,
}

impl MockVfsOps {
    pub const fn new() -> Self {
        Self {
            denied_start: AtomicUsize::new(0),
            denied_len: AtomicUsize::new(0),
            user_access_depth: AtomicUsize::new(0),
            user_access_count: AtomicUsize::new(0),
        }
    }

    /// 拒绝 `[start, start + len)` 范围内的用户缓冲区
    pub fn deny_user_range(&self, start: usize, len: usize) {
        self.denied_start.store(start, Ordering::SeqCst);
        self.denied_len.store(len, Ordering::SeqCst);
    }

    /// 清除被拒绝的范围
    pub fn allow_all(&self) {
        self.denied_len.store(0, Ordering::SeqCst);
    }

    pub fn user_range_valid(&self, addr: usize, len: usize) -> bool {
        if addr == 0 || addr.checked_add(len).is_none() {
            return false;
        }
        let start = self.denied_start.load(Ordering::SeqCst);
        let denied = self.denied_len.load(Ordering::SeqCst);
        denied == 0 || addr + len <= start || addr >= start + denied
    }

    pub fn enter_user_access(&self) {
        self.user_access_depth.fetch_add(1, Ordering::SeqCst);
        self.user_access_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn exit_user_access(&self) {
        self.user_access_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 全局 Mock 实例
pub static MOCK_VFS_OPS: MockVfsOps = MockVfsOps::new();
