// System V message queue channel
// reason: libc for msgget/msgsnd/msgrcv/msgctl (not wrapped by nix), nix for errno

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use libc::{c_int, c_long, c_void, key_t};
use nix::errno::Errno;
use once_cell::sync::OnceCell;
use tracing::debug;

use ipcq_core::domain::QueueId;
use ipcq_core::port::TransportError;

/// Largest payload a single message may carry, in bytes
pub const MSG_MAX_SIZE: usize = 1024;

/// File whose inode anchors key derivation unless another is configured
pub const DEFAULT_KEY_ANCHOR: &str = "/tmp";

/// Every message is sent with this type; receivers accept any type
const MESSAGE_TYPE: c_long = 1;

#[repr(C)]
struct MessageBuffer {
    mtype: c_long,
    mtext: [u8; MSG_MAX_SIZE],
}

impl MessageBuffer {
    fn empty() -> Self {
        Self {
            mtype: 0,
            mtext: [0; MSG_MAX_SIZE],
        }
    }
}

/// Snapshot of a channel's kernel state (`IPC_STAT`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    pub pending_messages: u64,
    pub max_bytes: u64,
    pub last_send_pid: i32,
    pub last_receive_pid: i32,
}

fn os_error(operation: &'static str, errno: Errno) -> TransportError {
    TransportError::Os {
        operation,
        source: std::io::Error::from(errno),
    }
}

/// Handle to one System V message queue
///
/// The key is `ftok(anchor, id)`, so every process using the same anchor
/// file and queue id shares the channel. The kernel queue is created on
/// first use and outlives this handle.
pub struct QueueChannel {
    anchor: PathBuf,
    anchor_c: CString,
    id: QueueId,
    permissions: u32,
    key: OnceCell<key_t>,
    handle: OnceCell<c_int>,
}

impl QueueChannel {
    pub fn new(anchor: impl AsRef<Path>, id: QueueId, permissions: u32) -> Result<Self, TransportError> {
        let anchor = anchor.as_ref().to_path_buf();
        let anchor_c = CString::new(anchor.as_os_str().as_bytes()).map_err(|_| {
            TransportError::Channel(format!("key anchor {} contains a NUL byte", anchor.display()))
        })?;
        Ok(Self {
            anchor,
            anchor_c,
            id,
            permissions,
            key: OnceCell::new(),
            handle: OnceCell::new(),
        })
    }

    pub fn anchor(&self) -> &Path {
        &self.anchor
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Derive the System V key from the anchor file and queue id
    pub fn key(&self) -> Result<key_t, TransportError> {
        self.key
            .get_or_try_init(|| {
                let key = unsafe { libc::ftok(self.anchor_c.as_ptr(), self.id.as_byte() as c_int) };
                if key == -1 {
                    return Err(os_error("ftok", Errno::last()));
                }
                Ok(key)
            })
            .copied()
    }

    /// Open the queue, creating it with the configured permissions if needed
    fn handle(&self) -> Result<c_int, TransportError> {
        self.open(libc::IPC_CREAT | self.permissions as c_int)
    }

    /// Open the queue only if it already exists
    ///
    /// A missing queue is `TransportError::NotFound`, and nothing is created.
    fn existing_handle(&self) -> Result<c_int, TransportError> {
        self.open(0)
    }

    fn open(&self, flags: c_int) -> Result<c_int, TransportError> {
        self.handle
            .get_or_try_init(|| {
                let key = self.key()?;
                let handle = unsafe { libc::msgget(key, flags) };
                if handle == -1 {
                    return Err(match Errno::last() {
                        Errno::ENOENT => TransportError::NotFound(format!(
                            "queue {} on {} (key {:#x})",
                            self.id,
                            self.anchor.display(),
                            key
                        )),
                        errno => os_error("msgget", errno),
                    });
                }
                debug!(
                    queue_id = %self.id,
                    key = key,
                    handle = handle,
                    anchor = %self.anchor.display(),
                    may_create = flags & libc::IPC_CREAT != 0,
                    "Opened message queue"
                );
                Ok(handle)
            })
            .copied()
    }

    /// Enqueue one payload
    ///
    /// Without `wait`, a full queue fails with `TransportError::Full`
    /// instead of suspending the caller.
    pub fn send_bytes(&self, payload: &[u8], wait: bool) -> Result<(), TransportError> {
        if payload.len() > MSG_MAX_SIZE {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: MSG_MAX_SIZE,
            });
        }
        let handle = self.handle()?;

        let mut buffer = MessageBuffer::empty();
        buffer.mtype = MESSAGE_TYPE;
        buffer.mtext[..payload.len()].copy_from_slice(payload);

        let flags = if wait { 0 } else { libc::IPC_NOWAIT };
        loop {
            let rc = unsafe {
                libc::msgsnd(
                    handle,
                    &buffer as *const MessageBuffer as *const c_void,
                    payload.len(),
                    flags,
                )
            };
            if rc == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::EAGAIN => return Err(TransportError::Full),
                errno => return Err(os_error("msgsnd", errno)),
            }
        }
    }

    /// Remove the oldest pending payload
    ///
    /// With `wait` this suspends until a message arrives; otherwise an empty
    /// queue yields `Ok(None)`.
    pub fn receive_bytes(&self, wait: bool) -> Result<Option<Vec<u8>>, TransportError> {
        let handle = self.handle()?;
        let mut buffer = MessageBuffer::empty();

        let flags = if wait { 0 } else { libc::IPC_NOWAIT };
        loop {
            let received = unsafe {
                libc::msgrcv(
                    handle,
                    &mut buffer as *mut MessageBuffer as *mut c_void,
                    MSG_MAX_SIZE,
                    0,
                    flags,
                )
            };
            if received >= 0 {
                return Ok(Some(buffer.mtext[..received as usize].to_vec()));
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::ENOMSG | Errno::EAGAIN => return Ok(None),
                errno => return Err(os_error("msgrcv", errno)),
            }
        }
    }

    /// Read the queue's kernel state without creating it
    pub fn stat(&self) -> Result<ChannelStats, TransportError> {
        let handle = self.existing_handle()?;
        let mut ds: libc::msqid_ds = unsafe { std::mem::zeroed() };
        if unsafe { libc::msgctl(handle, libc::IPC_STAT, &mut ds) } == -1 {
            return Err(os_error("msgctl(IPC_STAT)", Errno::last()));
        }
        Ok(ChannelStats {
            pending_messages: ds.msg_qnum as u64,
            max_bytes: ds.msg_qbytes as u64,
            last_send_pid: ds.msg_lspid as i32,
            last_receive_pid: ds.msg_lrpid as i32,
        })
    }

    /// Destroy the kernel queue, discarding pending messages
    ///
    /// Fails with `TransportError::NotFound` when no queue exists. Other
    /// handles on the same key start failing; this handle must not be used
    /// afterwards.
    pub fn remove(&self) -> Result<(), TransportError> {
        let handle = self.existing_handle()?;
        if unsafe { libc::msgctl(handle, libc::IPC_RMID, std::ptr::null_mut()) } == -1 {
            return Err(os_error("msgctl(IPC_RMID)", Errno::last()));
        }
        debug!(queue_id = %self.id, handle = handle, "Removed message queue");
        Ok(())
    }
}
