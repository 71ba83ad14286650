//! 挂载管理
//!
//! 把分区设备上的文件系统实例挂到命名空间的目录下。挂载节点以单调递增的计数命名
//! （`0`、`1`、...），已被占用的编号会被跳过；根文件系统引导时每个候选设备挂载前计数归零。

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::Ordering;
use uapi::vfs::OpenMode;

use crate::config::DEV_DIR;
use crate::node::{MountPoint, NodeId, NodeKind};
use crate::{FsError, Vfs};

impl Vfs {
    /// 把 `device_path` 上的文件系统挂载到目录 `mount_path` 下
    ///
    /// 返回新建的挂载节点。文件系统初始化失败时不会留下节点，也不会消耗挂载编号。
    pub fn mount(&self, mount_path: &str, device_path: &str) -> Result<NodeId, FsError> {
        let mut tree = self.tree.write();
        let dev_node = tree
            .resolve_exact(device_path)
            .map_err(|_| FsError::NoDevice)?;
        let target = tree
            .resolve_exact(mount_path)
            .map_err(|_| FsError::MountpointNotFound)?;

        let dev = match tree.get(dev_node).map(|node| node.kind()) {
            Some(NodeKind::Device(dev)) => dev.clone(),
            _ => return Err(FsError::NotDevice),
        };
        if !dev.is_partition() {
            return Err(FsError::NotPartition);
        }
        let fs = dev.filesystem().ok_or(FsError::NoFilesystem)?;

        // 跳过已被占用的编号，手工创建的同名节点不会让计数卡住
        let mut mount_id = self.next_mount_id.load(Ordering::Acquire);
        while tree.find_child(target, &mount_id.to_string()).is_some() {
            mount_id = mount_id.wrapping_add(1);
        }
        let name = mount_id.to_string();
        tree.check_insert(target, &name)?;

        if !fs.init() {
            log::warn!("vfs: {} filesystem on {} failed to initialize", fs.fs_type(), device_path);
            return Err(FsError::InitFailed);
        }

        let root = self.cache.lock().insert_root(fs.root());
        let mount = MountPoint {
            fs: fs.clone(),
            root,
        };
        let node = match tree.insert(target, &name, NodeKind::Mount(mount)) {
            Ok(node) => node,
            Err(err) => {
                let _ = self.cache.lock().purge(root);
                fs.destroy();
                return Err(err);
            }
        };
        self.next_mount_id.store(mount_id + 1, Ordering::Release);

        log::info!(
            "vfs: mounted {} ({}) at {}",
            device_path,
            fs.fs_type(),
            tree.path_of(node)
        );
        Ok(node)
    }

    /// 卸载 `mount_path` 处的挂载节点
    ///
    /// 节点仍被流引用或其下有被钉住的资源时返回 [`FsError::Busy`]。
    pub fn unmount(&self, mount_path: &str) -> Result<(), FsError> {
        let mut tree = self.tree.write();
        let id = tree
            .resolve_exact(mount_path)
            .map_err(|_| FsError::MountpointNotFound)?;
        let node = tree.get(id).ok_or(FsError::MountpointNotFound)?;
        let NodeKind::Mount(mount) = node.kind().clone() else {
            return Err(FsError::InvalidArgument);
        };
        if node.ref_count() > 0 || self.streams.references_node(id) {
            log::debug!("vfs: unmount of {} refused, streams still open", mount_path);
            return Err(FsError::Busy);
        }

        let purged = self.cache.lock().purge(mount.root)?;
        tree.unlink(id)?;
        drop(tree);

        mount.fs.destroy();
        log::info!(
            "vfs: unmounted {} ({}), {} resources dropped",
            mount_path,
            mount.fs.fs_type(),
            purged
        );
        Ok(())
    }

    /// 引导根文件系统
    ///
    /// 按注册顺序尝试 `/dev` 下的每个设备：挂载到根挂载路径，检查标记文件，
    /// 保留第一个满足条件的设备，其余的挂载后立即卸载。每个候选挂载前计数归零，
    /// 因此根文件系统总是落在第一个空闲编号上（通常是 `0`）。
    pub fn mount_root(&self) -> Result<NodeId, FsError> {
        let dev_dir = String::from("/") + DEV_DIR;
        let candidates: Vec<String> = self.children(&dev_dir)?;
        for dev_name in candidates {
            let dev_path = format!("{}/{}", dev_dir, dev_name);
            self.next_mount_id.store(0, Ordering::Release);
            let node = match self.mount(self.config.root_mount_path, &dev_path) {
                Ok(node) => node,
                Err(err) => {
                    log::debug!("vfs: root candidate {} skipped: {:?}", dev_path, err);
                    continue;
                }
            };
            let Some(mount_path) = self.path_of(node) else {
                continue;
            };

            let marker = format!("{}/{}", mount_path, self.config.root_marker);
            match self.open(&marker, OpenMode::READ) {
                Ok(stream) => {
                    self.close(stream);
                    log::info!("vfs: root filesystem is {} at {}", dev_path, mount_path);
                    *self.root_mount.lock() = Some(mount_path);
                    return Ok(node);
                }
                Err(_) => {
                    if let Err(err) = self.unmount(&mount_path) {
                        log::warn!("vfs: failed to unmount rejected root {}: {:?}", mount_path, err);
                    }
                }
            }
        }

        log::warn!("vfs: no device carries the root marker '{}'", self.config.root_marker);
        Err(FsError::NotFound)
    }

    /// 卸载根文件系统
    pub fn unmount_root(&self) -> Result<(), FsError> {
        let path = self.root_mount.lock().clone().ok_or(FsError::NotFound)?;
        self.unmount(&path)?;
        *self.root_mount.lock() = None;
        Ok(())
    }
}
