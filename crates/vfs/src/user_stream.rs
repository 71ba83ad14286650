//! 进程级流表
//!
//! 每个进程持有一张 描述符 → [`UserspaceStream`] 的表，描述符指向内核流，
//! 并带有自己的访问模式。分配总是取最小的空闲描述符，0/1/2 留给标准输入/输出/错误。

use alloc::vec::Vec;
use core::fmt;
use sync::SpinLock;
use uapi::vfs::OpenMode;

use crate::stream::StreamId;
use crate::{FsError, Vfs};

/// 用户态描述符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserspaceStream {
    /// 对应的内核流
    pub stream: StreamId,
    /// 描述符的访问模式
    pub mode: OpenMode,
}

/// 标准输入/输出/错误的来源
///
/// 为 `None` 的项从父进程的同号描述符复制。
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioPaths<'a> {
    /// 标准输入
    pub stdin: Option<&'a str>,
    /// 标准输出
    pub stdout: Option<&'a str>,
    /// 标准错误
    pub stderr: Option<&'a str>,
}

impl<'a> StdioPaths<'a> {
    /// 三者都打开同一路径
    pub fn all(path: &'a str) -> Self {
        Self {
            stdin: Some(path),
            stdout: Some(path),
            stderr: Some(path),
        }
    }
}

/// 进程级流表
pub struct UserStreamTable {
    slots: SpinLock<Vec<Option<UserspaceStream>>>,
}

impl fmt::Debug for UserStreamTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        let used = slots.iter().filter(|slot| slot.is_some()).count();
        f.debug_struct("UserStreamTable")
            .field("slots", &slots.len())
            .field("used", &used)
            .finish()
    }
}

impl UserStreamTable {
    /// 创建空表
    pub fn new() -> Self {
        Self {
            slots: SpinLock::new(Vec::new()),
        }
    }

    /// 分配最小可用描述符
    pub fn alloc(&self, entry: UserspaceStream) -> usize {
        let mut slots = self.slots.lock();
        if let Some(fd) = slots.iter().position(Option::is_none) {
            slots[fd] = Some(entry);
            return fd;
        }
        slots.push(Some(entry));
        slots.len() - 1
    }

    /// 在指定描述符处安装，原有的项被替换并返回
    pub fn install_at(&self, fd: usize, entry: UserspaceStream) -> Option<UserspaceStream> {
        let mut slots = self.slots.lock();
        if slots.len() <= fd {
            slots.resize(fd + 1, None);
        }
        slots[fd].replace(entry)
    }

    /// 查找描述符
    pub fn get(&self, fd: usize) -> Result<UserspaceStream, FsError> {
        self.slots
            .lock()
            .get(fd)
            .copied()
            .flatten()
            .ok_or(FsError::BadStream)
    }

    /// 移除描述符，不关闭内核流
    pub fn remove(&self, fd: usize) -> Result<UserspaceStream, FsError> {
        self.slots
            .lock()
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(FsError::BadStream)
    }

    /// 取走并清空所有描述符
    pub fn take_all(&self) -> Vec<(usize, UserspaceStream)> {
        let mut slots = self.slots.lock();
        slots
            .iter_mut()
            .enumerate()
            .filter_map(|(fd, slot)| slot.take().map(|entry| (fd, entry)))
            .collect()
    }

    /// 已使用的描述符数量
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// 是否没有描述符
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 关闭描述符及其内核流
    pub fn close(&self, vfs: &Vfs, fd: usize) -> Result<(), FsError> {
        let entry = self.remove(fd)?;
        vfs.close(entry.stream);
        Ok(())
    }

    /// 关闭全部描述符，用于进程退出
    pub fn close_all(&self, vfs: &Vfs) {
        for (_, entry) in self.take_all() {
            vfs.close(entry.stream);
        }
    }

    /// 为新进程建立标准输入/输出/错误
    ///
    /// 描述符 0 以只读、1 和 2 以只写方式创建。给出路径的项重新打开路径，
    /// 否则复制 `parent` 中的同号描述符。任一步失败时只关闭本次建立的描述符，
    /// 被替换的原有描述符原样放回；成功后才关闭被替换的描述符。
    pub fn init_userspace(
        &self,
        vfs: &Vfs,
        parent: Option<&UserStreamTable>,
        stdio: &StdioPaths<'_>,
    ) -> Result<(), FsError> {
        let plan = [
            (0, OpenMode::READ, stdio.stdin),
            (1, OpenMode::WRITE, stdio.stdout),
            (2, OpenMode::WRITE, stdio.stderr),
        ];
        let mut installed = Vec::new();
        let mut replaced = Vec::new();
        for (fd, mode, path) in plan {
            let opened = match (path, parent) {
                (Some(path), _) => vfs.open(path, mode),
                (None, Some(parent)) => parent
                    .get(fd)
                    .and_then(|inherited| vfs.reopen(inherited.stream, mode)),
                (None, None) => Err(FsError::InvalidArgument),
            };
            match opened {
                Ok(stream) => {
                    if let Some(old) = self.install_at(fd, UserspaceStream { stream, mode }) {
                        replaced.push((fd, old));
                    }
                    installed.push(fd);
                }
                Err(err) => {
                    log::warn!("vfs: failed to set up descriptor {}: {:?}", fd, err);
                    for fd in installed {
                        let _ = self.close(vfs, fd);
                    }
                    for (fd, old) in replaced {
                        self.install_at(fd, old);
                    }
                    return Err(err);
                }
            }
        }
        for (_, old) in replaced {
            vfs.close(old.stream);
        }
        Ok(())
    }
}

impl Default for UserStreamTable {
    fn default() -> Self {
        Self::new()
    }
}
