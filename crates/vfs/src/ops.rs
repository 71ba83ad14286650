//! VFS 运行时操作 trait 定义和注册
//!
//! 此模块定义了 VFS 层需要的外部依赖接口，通过 trait 抽象实现与内核其余部分的解耦。

use core::sync::atomic::{AtomicUsize, Ordering};

/// VFS 运行时操作
///
/// 面向用户态的系统调用入口需要校验用户缓冲区并打开用户内存访问。
/// 内核需要实现此 trait 并在启动时注册。
pub trait VfsOps: Send + Sync {
    /// `[addr, addr + len)` 是否完全位于当前进程的用户地址空间内
    fn user_range_valid(&self, addr: usize, len: usize) -> bool;

    /// 进入用户空间访问模式
    fn enter_user_access(&self);

    /// 退出用户空间访问模式
    fn exit_user_access(&self);
}

static VFS_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static VFS_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册 VFS 操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_vfs_ops(ops: &'static dyn VfsOps) {
    let ptr = ops as *const dyn VfsOps;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn VfsOps, (usize, usize)>(ptr) };
    VFS_OPS_DATA.store(data, Ordering::Release);
    VFS_OPS_VTABLE.store(vtable, Ordering::Release);
}

/// 获取已注册的 VFS 操作实现
///
/// # Panics
/// 如果尚未调用 [`register_vfs_ops`] 注册实现，则 panic
#[inline]
pub fn vfs_ops() -> &'static dyn VfsOps {
    let data = VFS_OPS_DATA.load(Ordering::Acquire);
    let vtable = VFS_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            extern crate test_support;
            return &test_support::mock::vfs::MOCK_VFS_OPS;
        }
        #[cfg(not(test))]
        panic!("vfs: VfsOps not registered");
    }
    // SAFETY: 重组 fat pointer
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn VfsOps>((data, vtable)) }
}

/// 用户空间访问保护 guard
///
/// 在作用域结束时自动退出用户空间访问模式
pub struct UserAccessGuard;

impl UserAccessGuard {
    /// 创建新的用户空间访问保护
    #[inline]
    pub fn new() -> Self {
        vfs_ops().enter_user_access();
        Self
    }
}

impl Drop for UserAccessGuard {
    #[inline]
    fn drop(&mut self) {
        vfs_ops().exit_user_access();
    }
}

impl Default for UserAccessGuard {
    fn default() -> Self {
        Self::new()
    }
}
