// Unit tests for the VFS layer.
//
// 测试在宿主机上用标准 `cargo test` 运行；驱动全部由 `mock` 中的内存实现代替。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{Vfs, VfsConfig};

mod mock;

mod resource_cache;

use mock::{MemFs, MemResource, MockDevice};

struct DummyArchOps;

impl sync::ArchOps for DummyArchOps {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        0
    }

    unsafe fn restore_interrupts(&self, _flags: usize) {}

    fn sstatus_sie(&self) -> usize {
        0
    }

    fn cpu_id(&self) -> usize {
        0
    }

    fn max_cpu_count(&self) -> usize {
        1
    }
}

static DUMMY_ARCH_OPS: DummyArchOps = DummyArchOps;
static SYNC_INIT: AtomicUsize = AtomicUsize::new(0);

fn init_sync_arch_ops() {
    match SYNC_INIT.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            // Safety: tests use a single global dummy ArchOps.
            unsafe { sync::register_arch_ops(&DUMMY_ARCH_OPS) };
            SYNC_INIT.store(2, Ordering::Release);
        }
        Err(_) => {
            while SYNC_INIT.load(Ordering::Acquire) != 2 {
                core::hint::spin_loop();
            }
        }
    }
}

// 测试辅助函数 (fixtures)

/// 创建使用默认配置的 VFS 实例
fn new_vfs() -> Vfs {
    init_sync_arch_ops();
    Vfs::new()
}

/// 创建指定资源缓存容量的 VFS 实例
fn vfs_with_capacity(max_res_buffer: usize) -> Vfs {
    init_sync_arch_ops();
    Vfs::with_config(VfsConfig {
        max_res_buffer,
        ..VfsConfig::default()
    })
}

/// 示例文件系统：
///
/// ```text
/// /
/// ├── kernel
/// ├── ro          (只读)
/// ├── log
/// └── docs/
///     └── readme  ("hello")
/// ```
fn sample_fs(read_only: bool) -> Arc<MemFs> {
    let root = MemResource::dir(
        "/",
        vec![
            MemResource::file("kernel", b"\x7fELF"),
            MemResource::read_only_file("ro", b"fixed"),
            MemResource::file("log", b"abc"),
            MemResource::dir("docs", vec![MemResource::file("readme", b"hello")]),
        ],
    );
    MemFs::new(root, read_only)
}

/// 不含标记文件的文件系统
fn markerless_fs() -> Arc<MemFs> {
    MemFs::new(
        MemResource::dir("/", vec![MemResource::file("data", b"")]),
        false,
    )
}

/// 注册分区设备 `/dev/<name>` 并挂载到 `/mount`，返回文件系统与挂载路径
fn mount_sample(vfs: &Vfs, name: &str) -> (Arc<MemFs>, String) {
    let fs = sample_fs(false);
    vfs.register_device(MockDevice::partition(name, Some(fs.clone())))
        .unwrap();
    let dev_path = alloc::format!("/dev/{}", name);
    let node = vfs.mount("/mount", &dev_path).unwrap();
    (fs, vfs.path_of(node).unwrap())
}
