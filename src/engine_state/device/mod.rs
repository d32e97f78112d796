//! # Device Module
//!
//! The narrow graphics-device surface the streaming engine depends on.
//!
//! ## Architecture
//!
//! [`GraphicsDevice`] exposes raw buffer allocation, host mapping, recorded
//! buffer-to-buffer copies and fence based submission. Two backends implement
//! it:
//!
//! * [`host_device::HostDevice`] keeps every buffer in process memory. It backs
//!   the tests and the headless demo, and can simulate memory exhaustion and
//!   slow transfers.
//! * [`wgpu_device::WgpuDevice`] drives real GPU buffers through wgpu.
//!
//! A device is shared between the arena buffer manager and the world through a
//! [`DeviceContext`], an explicitly passed handle. There is no global device.

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
    time::Duration,
};

pub mod host_device;
pub mod wgpu_device;

/// Opaque identity of a device buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// What a buffer is used for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Chunk geometry: vertex input and copy destination
    Geometry,
    /// Upload source for staged copies
    Staging,
}

/// Where a buffer's memory lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemoryVisibility {
    /// Writable from the host through [`GraphicsDevice::map`]
    HostVisible,
    /// Only reachable through copies
    DeviceLocal,
}

/// A freshly allocated device buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceAllocation {
    /// The buffer
    pub handle: BufferHandle,
    /// Size in bytes, possibly rounded up by the device
    pub size: u64,
    /// Required alignment of sub-allocation offsets
    pub alignment: u64,
}

/// One recorded buffer-to-buffer copy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferCopy {
    /// Source buffer
    pub src: BufferHandle,
    /// Byte offset into the source
    pub src_offset: u64,
    /// Destination buffer
    pub dst: BufferHandle,
    /// Byte offset into the destination
    pub dst_offset: u64,
    /// Bytes to copy
    pub size: u64,
}

/// Completion signal of one submission.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fence(pub u64);

/// Errors raised by a graphics device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No memory left for an allocation of this many bytes
    OutOfMemory {
        /// Bytes requested
        requested: u64,
    },
    /// A submission did not complete in time
    Timeout,
    /// No suitable adapter was found
    AdapterUnavailable(String),
    /// The adapter refused to create a device
    DeviceRequest(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OutOfMemory { requested } => {
                write!(f, "device out of memory allocating {requested} bytes")
            }
            DeviceError::Timeout => write!(f, "timed out waiting for submitted work"),
            DeviceError::AdapterUnavailable(reason) => write!(f, "no graphics adapter: {reason}"),
            DeviceError::DeviceRequest(reason) => write!(f, "device request failed: {reason}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Buffer allocation, mapping, copies and submission.
pub trait GraphicsDevice {
    /// Allocates a buffer.
    fn allocate(
        &mut self,
        usage: BufferUsage,
        visibility: MemoryVisibility,
        size: u64,
    ) -> Result<DeviceAllocation, DeviceError>;

    /// Host view of `size` bytes at `offset`.
    ///
    /// `None` for device-local buffers, unknown handles or out-of-range views.
    fn map(&mut self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&mut [u8]>;

    /// Read-only host view of `size` bytes at `offset`.
    ///
    /// Unlike [`map`](Self::map), the range is not scheduled for upload.
    fn read_mapped(&self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&[u8]>;

    /// Records a copy. It executes on the next [`submit`](Self::submit).
    fn copy(&mut self, copy: BufferCopy);

    /// Makes host writes visible to the device.
    fn flush(&mut self);

    /// Flushes host writes and submits every recorded copy.
    fn submit(&mut self) -> Fence;

    /// Whether the work behind a fence has finished.
    fn is_complete(&mut self, fence: Fence) -> bool;

    /// Waits for a fence. `None` waits without a bound.
    ///
    /// # Returns
    /// `true` if the fence signalled in time.
    fn wait(&mut self, fence: Fence, timeout: Option<Duration>) -> bool;

    /// Releases a buffer.
    fn free(&mut self, buffer: BufferHandle);

    /// Submits the recorded work and blocks until it completes.
    fn submit_and_wait(&mut self) -> Result<(), DeviceError> {
        let fence = self.submit();
        if self.wait(fence, None) {
            Ok(())
        } else {
            Err(DeviceError::Timeout)
        }
    }
}

/// Shared handle to a device.
pub struct DeviceContext<D> {
    inner: Rc<RefCell<D>>,
}

impl<D> Clone for DeviceContext<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: GraphicsDevice> DeviceContext<D> {
    /// Wraps a device.
    pub fn new(device: D) -> Self {
        Self {
            inner: Rc::new(RefCell::new(device)),
        }
    }

    /// Shared access to the device.
    pub fn get(&self) -> Ref<'_, D> {
        self.inner.borrow()
    }

    /// Exclusive access to the device.
    ///
    /// # Panics
    /// Panics if the device is already borrowed.
    pub fn get_mut(&self) -> RefMut<'_, D> {
        self.inner.borrow_mut()
    }

    /// Exclusive access, or `None` if the device is already borrowed.
    pub fn try_get_mut(&self) -> Option<RefMut<'_, D>> {
        self.inner.try_borrow_mut().ok()
    }
}
