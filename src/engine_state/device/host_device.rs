//! In-memory graphics device.
//!
//! Every buffer is a `Vec<u8>`. Recorded copies run at submission time.
//! Fences normally signal immediately; with deferred completion they stay
//! pending until [`HostDevice::complete_pending`] is called, which lets
//! callers exercise their transfer gating without a GPU.

use std::{collections::HashMap, time::Duration};

use log::debug;

use super::{
    BufferCopy, BufferHandle, BufferUsage, DeviceAllocation, DeviceError, Fence, GraphicsDevice,
    MemoryVisibility,
};

/// Default offset alignment, matching common device requirements.
pub const DEFAULT_HOST_ALIGNMENT: u64 = 256;

struct HostBuffer {
    bytes: Vec<u8>,
    visibility: MemoryVisibility,
}

/// Graphics device backed by process memory.
pub struct HostDevice {
    buffers: HashMap<BufferHandle, HostBuffer>,
    next_handle: u32,
    alignment: u64,
    memory_limit: Option<u64>,
    allocated: u64,
    recorded: Vec<BufferCopy>,
    last_submitted: u64,
    last_completed: u64,
    defer_completion: bool,
    copies_executed: usize,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_ALIGNMENT)
    }
}

impl HostDevice {
    /// Creates a device with the given offset alignment and no memory limit.
    pub fn new(alignment: u64) -> Self {
        Self {
            buffers: HashMap::new(),
            next_handle: 0,
            alignment: alignment.max(1),
            memory_limit: None,
            allocated: 0,
            recorded: Vec::new(),
            last_submitted: 0,
            last_completed: 0,
            defer_completion: false,
            copies_executed: 0,
        }
    }

    /// Caps the total bytes this device hands out.
    pub fn with_memory_limit(mut self, limit: u64) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Keeps fences pending until [`complete_pending`](Self::complete_pending).
    pub fn set_deferred_completion(&mut self, defer: bool) {
        self.defer_completion = defer;
        if !defer {
            self.complete_pending();
        }
    }

    /// Signals every submitted fence.
    pub fn complete_pending(&mut self) {
        self.last_completed = self.last_submitted;
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    /// Live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Copies executed so far.
    pub fn copies_executed(&self) -> usize {
        self.copies_executed
    }

    /// Reads back any buffer, device-local ones included.
    pub fn read(&self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(size).ok()?)?;
        self.buffers.get(&buffer)?.bytes.get(start..end)
    }

    fn execute(&mut self, copy: BufferCopy) {
        let Some(data) = self
            .read(copy.src, copy.src_offset, copy.size)
            .map(<[u8]>::to_vec)
        else {
            debug!("dropping copy with invalid source range {:?}", copy);
            return;
        };
        let start = copy.dst_offset as usize;
        match self
            .buffers
            .get_mut(&copy.dst)
            .and_then(|dst| dst.bytes.get_mut(start..start + data.len()))
        {
            Some(target) => {
                target.copy_from_slice(&data);
                self.copies_executed += 1;
            }
            None => debug!("dropping copy with invalid destination range {:?}", copy),
        }
    }
}

impl GraphicsDevice for HostDevice {
    fn allocate(
        &mut self,
        _usage: BufferUsage,
        visibility: MemoryVisibility,
        size: u64,
    ) -> Result<DeviceAllocation, DeviceError> {
        let exceeds_limit = self
            .memory_limit
            .is_some_and(|limit| self.allocated.saturating_add(size) > limit);
        let length = usize::try_from(size).map_err(|_| DeviceError::OutOfMemory { requested: size })?;
        if exceeds_limit {
            return Err(DeviceError::OutOfMemory { requested: size });
        }

        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.allocated += size;
        self.buffers.insert(
            handle,
            HostBuffer {
                bytes: vec![0; length],
                visibility,
            },
        );

        Ok(DeviceAllocation {
            handle,
            size,
            alignment: self.alignment,
        })
    }

    fn map(&mut self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&mut [u8]> {
        let host_buffer = self.buffers.get_mut(&buffer)?;
        if host_buffer.visibility != MemoryVisibility::HostVisible {
            return None;
        }
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(size).ok()?)?;
        host_buffer.bytes.get_mut(start..end)
    }

    fn read_mapped(&self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&[u8]> {
        if self.buffers.get(&buffer)?.visibility != MemoryVisibility::HostVisible {
            return None;
        }
        self.read(buffer, offset, size)
    }

    fn copy(&mut self, copy: BufferCopy) {
        self.recorded.push(copy);
    }

    fn flush(&mut self) {}

    fn submit(&mut self) -> Fence {
        for copy in std::mem::take(&mut self.recorded) {
            self.execute(copy);
        }
        self.last_submitted += 1;
        if !self.defer_completion {
            self.last_completed = self.last_submitted;
        }
        Fence(self.last_submitted)
    }

    fn is_complete(&mut self, fence: Fence) -> bool {
        fence.0 <= self.last_completed
    }

    fn wait(&mut self, fence: Fence, _timeout: Option<Duration>) -> bool {
        self.is_complete(fence)
    }

    fn free(&mut self, buffer: BufferHandle) {
        if let Some(host_buffer) = self.buffers.remove(&buffer) {
            self.allocated -= host_buffer.bytes.len() as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_run_on_submit_and_device_local_memory_is_not_mappable() {
        let mut device = HostDevice::default();
        let src = device
            .allocate(BufferUsage::Staging, MemoryVisibility::HostVisible, 64)
            .unwrap();
        let dst = device
            .allocate(BufferUsage::Geometry, MemoryVisibility::DeviceLocal, 64)
            .unwrap();
        assert!(device.map(dst.handle, 0, 8).is_none());

        device.map(src.handle, 8, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        device.copy(BufferCopy {
            src: src.handle,
            src_offset: 8,
            dst: dst.handle,
            dst_offset: 32,
            size: 4,
        });
        assert_eq!(device.read(dst.handle, 32, 4), Some(&[0u8; 4][..]));

        device.submit_and_wait().unwrap();
        assert_eq!(device.read(dst.handle, 32, 4), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(device.copies_executed(), 1);
    }

    #[test]
    fn read_only_views_follow_the_mapping_rules() {
        let mut device = HostDevice::default();
        let visible = device
            .allocate(BufferUsage::Geometry, MemoryVisibility::HostVisible, 16)
            .unwrap();
        let local = device
            .allocate(BufferUsage::Geometry, MemoryVisibility::DeviceLocal, 16)
            .unwrap();
        device.map(visible.handle, 4, 2).unwrap().copy_from_slice(&[5, 6]);

        assert_eq!(device.read_mapped(visible.handle, 4, 2), Some(&[5u8, 6][..]));
        assert_eq!(device.read_mapped(visible.handle, 12, 8), None);
        assert_eq!(device.read_mapped(local.handle, 0, 4), None);
    }

    #[test]
    fn deferred_fences_stay_pending_until_completed() {
        let mut device = HostDevice::default();
        device.set_deferred_completion(true);
        let fence = device.submit();
        assert!(!device.wait(fence, Some(Duration::from_millis(1))));
        assert_eq!(device.submit_and_wait(), Err(DeviceError::Timeout));
        device.complete_pending();
        assert!(device.is_complete(fence));
    }

    #[test]
    fn memory_limit_is_enforced_and_freeing_returns_memory() {
        let mut device = HostDevice::default().with_memory_limit(100);
        let a = device
            .allocate(BufferUsage::Geometry, MemoryVisibility::HostVisible, 80)
            .unwrap();
        assert_eq!(
            device.allocate(BufferUsage::Geometry, MemoryVisibility::HostVisible, 40),
            Err(DeviceError::OutOfMemory { requested: 40 })
        );
        device.free(a.handle);
        assert_eq!(device.allocated_bytes(), 0);
        assert!(device
            .allocate(BufferUsage::Geometry, MemoryVisibility::HostVisible, 40)
            .is_ok());
    }
}
