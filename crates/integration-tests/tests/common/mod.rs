//! Shared fixtures: queues on a private key anchor

#![allow(dead_code)]

use std::sync::Arc;

use ipcq_core::domain::QueueConfig;
use ipcq_core::port::TransportError;
use ipcq_core::Queue;
use ipcq_infra_sysv::SysVQueueBackend;
use tempfile::TempDir;

/// Kernel queue keyed on a temporary directory
///
/// Any queue left on the same key by an earlier crashed run is removed up
/// front, and the queue is removed again on drop.
pub struct TestChannel {
    pub dir: TempDir,
    pub id: &'static str,
}

impl TestChannel {
    pub fn new(id: &'static str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let channel = Self { dir, id };
        let _ = channel.backend(false).remove();
        channel
    }

    pub fn config(&self, blocking: bool) -> QueueConfig {
        QueueConfig::new(self.id, format!("test queue {}", self.id))
            .unwrap()
            .with_blocking(blocking)
            .with_permissions(0o600)
            .unwrap()
    }

    pub fn backend(&self, blocking: bool) -> SysVQueueBackend {
        SysVQueueBackend::with_anchor(&self.config(blocking), self.dir.path()).unwrap()
    }

    pub fn queue(&self) -> Queue {
        self.open(false)
    }

    pub fn blocking_queue(&self) -> Queue {
        self.open(true)
    }

    fn open(&self, blocking: bool) -> Queue {
        Queue::new(self.config(blocking), Arc::new(self.backend(blocking))).unwrap()
    }

    /// Messages waiting in the kernel queue; zero if it was never created
    pub fn pending(&self) -> u64 {
        match self.backend(false).channel().stat() {
            Ok(stats) => stats.pending_messages,
            Err(TransportError::NotFound(_)) => 0,
            Err(e) => panic!("stat failed: {e}"),
        }
    }
}

impl Drop for TestChannel {
    fn drop(&mut self) {
        let _ = self.backend(false).remove();
    }
}
