// src/platform/shm.rs

//! Anonymous shared-memory framebuffer for the Wayland backend.
//!
//! The backing object is an in-memory file (`memfd_create`); kernels
//! without it fall back to a POSIX shm object that is unlinked right after
//! opening. The object's size is fixed at creation, so a resize is always
//! destroy-then-allocate through `FramebufferSlot`.

use super::error::PlatformError;
use super::framebuffer::{FrameStorage, BYTES_PER_PIXEL};
use anyhow::Result;
use log::{debug, warn};
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::ffi::{c_void, CString};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicU32, Ordering};

/// A mapped, fd-backed pixel buffer.
pub struct ShmBuffer {
    ptr: *mut u8,
    len: usize,
    fd: Option<OwnedFd>,
    width: u32,
    height: u32,
}

impl ShmBuffer {
    /// The backing descriptor, for `wl_shm.create_pool`.
    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        self.fd.as_ref().map(|fd| fd.as_fd())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unmaps the pixels, then closes the descriptor. Idempotent.
    pub fn destroy(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: ptr/len came from a successful mmap and are unmapped once.
            let rc = unsafe { libc::munmap(self.ptr as *mut c_void, self.len) };
            if rc != 0 {
                warn!(
                    "munmap of {} byte framebuffer failed: {}",
                    self.len,
                    std::io::Error::last_os_error()
                );
            }
            self.ptr = std::ptr::null_mut();
        }
        if let Some(fd) = self.fd.take() {
            debug!("Closing framebuffer fd {}", fd.as_raw_fd());
            drop(fd);
        }
    }
}

impl FrameStorage for ShmBuffer {
    fn allocate(width: u32, height: u32) -> Result<Self> {
        let stride = width as usize * BYTES_PER_PIXEL;
        let len = stride * height as usize;
        if len == 0 {
            return Err(PlatformError::Shm(format!("empty framebuffer {}x{}", width, height)).into());
        }

        let fd = create_backing()?;
        // SAFETY: fd is a fresh descriptor we own.
        if unsafe { libc::ftruncate(fd.as_raw_fd(), len as libc::off_t) } < 0 {
            return Err(PlatformError::Shm(format!(
                "ftruncate({}) failed: {}",
                len,
                std::io::Error::last_os_error()
            ))
            .into());
        }

        // SAFETY: mapping a descriptor sized to exactly `len` bytes.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(PlatformError::Shm(format!(
                "mmap({}) failed: {}",
                len,
                std::io::Error::last_os_error()
            ))
            .into());
        }

        debug!(
            "Mapped {}x{} shm framebuffer ({} bytes, fd {})",
            width,
            height,
            len,
            fd.as_raw_fd()
        );
        Ok(ShmBuffer {
            ptr: ptr as *mut u8,
            len,
            fd: Some(fd),
            width,
            height,
        })
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        if self.ptr.is_null() {
            return &mut [];
        }
        // SAFETY: the mapping is live, len bytes long, and uniquely borrowed.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn create_backing() -> Result<OwnedFd, PlatformError> {
    let name = CString::new("core-window-shm").map_err(|e| PlatformError::Shm(e.to_string()))?;
    // SAFETY: name is a valid C string.
    let raw = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_CLOEXEC) };
    if raw >= 0 {
        // SAFETY: memfd_create returned a fresh descriptor.
        return Ok(unsafe { OwnedFd::from_raw_fd(raw) });
    }
    debug!(
        "memfd_create unavailable ({}), falling back to shm_open",
        std::io::Error::last_os_error()
    );
    open_unlinked_shm()
}

static SHM_COUNTER: AtomicU32 = AtomicU32::new(0);

fn open_unlinked_shm() -> Result<OwnedFd, PlatformError> {
    for _ in 0..16 {
        let name = format!(
            "/core-window-{}-{}",
            std::process::id(),
            SHM_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        match shm_open(
            name.as_str(),
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_CLOEXEC,
            Mode::S_IRUSR | Mode::S_IWUSR,
        ) {
            Ok(fd) => {
                if let Err(e) = shm_unlink(name.as_str()) {
                    warn!("shm_unlink({}) failed: {}", name, e);
                }
                return Ok(fd);
            }
            Err(nix::errno::Errno::EEXIST) => continue,
            Err(e) => return Err(PlatformError::Shm(format!("shm_open({}) failed: {}", name, e))),
        }
    }
    Err(PlatformError::Shm("no free shm name".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn it_should_map_a_writable_buffer_with_packed_stride() {
        let mut buf = ShmBuffer::allocate(16, 8).unwrap();
        assert_eq!(buf.stride(), 64);
        assert_eq!(buf.len(), 64 * 8);
        assert!(buf.fd().is_some());

        let pixels = buf.pixels_mut();
        pixels[0] = 0xAB;
        assert_eq!(buf.pixels_mut()[0], 0xAB);
    }

    #[test_log::test]
    fn it_should_release_mapping_and_fd_on_destroy() {
        let mut buf = ShmBuffer::allocate(4, 4).unwrap();
        buf.destroy();
        assert!(buf.fd().is_none());
        assert!(buf.pixels_mut().is_empty());
        // A second destroy is harmless.
        buf.destroy();
    }

    #[test_log::test]
    fn it_should_refuse_an_empty_size() {
        assert!(ShmBuffer::allocate(0, 10).is_err());
    }
}
