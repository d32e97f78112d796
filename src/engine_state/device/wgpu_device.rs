//! wgpu backed graphics device.
//!
//! wgpu has no persistently mapped buffers, so host-visible buffers carry a
//! CPU shadow copy. Mapping hands out a slice of the shadow and marks it dirty;
//! dirty ranges are uploaded with `Queue::write_buffer` on [`flush`] and
//! before every submission. Copies are recorded into a command encoder and
//! fences are completion flags set by `Queue::on_submitted_work_done`.
//!
//! [`flush`]: GraphicsDevice::flush

use std::{
    collections::HashMap,
    ops::Range,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{info, warn};
use web_time::Instant;

use super::{
    BufferCopy, BufferHandle, BufferUsage, DeviceAllocation, DeviceError, Fence, GraphicsDevice,
    MemoryVisibility,
};

/// Offset alignment handed out to sub-allocators.
pub const WGPU_REGION_ALIGNMENT: u64 = 256;

struct WgpuBuffer {
    buffer: wgpu::Buffer,
    shadow: Option<Vec<u8>>,
    dirty: Option<Range<u64>>,
}

/// Graphics device driving real GPU buffers.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: HashMap<BufferHandle, WgpuBuffer>,
    next_handle: u32,
    encoder: Option<wgpu::CommandEncoder>,
    fences: HashMap<u64, Arc<AtomicBool>>,
    next_fence: u64,
}

/// wgpu usage flags of a buffer class.
pub fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::Geometry => {
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC
        }
        BufferUsage::Staging => wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
    }
}

fn align_down(value: u64, alignment: u64) -> u64 {
    value - value % alignment
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

impl WgpuDevice {
    /// Wraps an existing device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::new(),
            next_handle: 0,
            encoder: None,
            fences: HashMap::new(),
            next_fence: 0,
        }
    }

    /// Creates a device on the default adapter without a surface.
    pub fn request_headless() -> Result<Self, DeviceError> {
        let start = Instant::now();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::empty(),
            backend_options: wgpu::BackendOptions::from_env_or_default(),
        });

        let (device, queue) = pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|err| DeviceError::AdapterUnavailable(err.to_string()))?;

            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("voxel-stream device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|err| DeviceError::DeviceRequest(err.to_string()))
        })?;

        info!("wgpu device ready in {:?}", start.elapsed());
        Ok(Self::new(device, queue))
    }

    /// The wgpu buffer behind a handle, for binding as vertex input.
    pub fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&handle).map(|entry| &entry.buffer)
    }

    fn poll(&self) {
        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            warn!("device poll failed: {err}");
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn allocate(
        &mut self,
        usage: BufferUsage,
        visibility: MemoryVisibility,
        size: u64,
    ) -> Result<DeviceAllocation, DeviceError> {
        let size = align_up(size.max(wgpu::COPY_BUFFER_ALIGNMENT), wgpu::COPY_BUFFER_ALIGNMENT);
        if size > self.device.limits().max_buffer_size {
            return Err(DeviceError::OutOfMemory { requested: size });
        }
        let shadow = match visibility {
            MemoryVisibility::HostVisible => {
                let length =
                    usize::try_from(size).map_err(|_| DeviceError::OutOfMemory { requested: size })?;
                Some(vec![0; length])
            }
            MemoryVisibility::DeviceLocal => None,
        };

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxel-stream arena block"),
            size,
            usage: buffer_usages(usage),
            mapped_at_creation: false,
        });

        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.buffers.insert(
            handle,
            WgpuBuffer {
                buffer,
                shadow,
                dirty: None,
            },
        );

        Ok(DeviceAllocation {
            handle,
            size,
            alignment: WGPU_REGION_ALIGNMENT,
        })
    }

    fn map(&mut self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&mut [u8]> {
        let entry = self.buffers.get_mut(&buffer)?;
        let shadow = entry.shadow.as_mut()?;
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(size).ok()?)?;
        let view = shadow.get_mut(start..end)?;

        let range = offset..offset + size;
        entry.dirty = Some(match entry.dirty.take() {
            Some(dirty) => dirty.start.min(range.start)..dirty.end.max(range.end),
            None => range,
        });
        Some(view)
    }

    fn read_mapped(&self, buffer: BufferHandle, offset: u64, size: u64) -> Option<&[u8]> {
        let shadow = self.buffers.get(&buffer)?.shadow.as_ref()?;
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(size).ok()?)?;
        shadow.get(start..end)
    }

    fn copy(&mut self, copy: BufferCopy) {
        if !self.buffers.contains_key(&copy.src) || !self.buffers.contains_key(&copy.dst) {
            warn!("dropping copy between unknown buffers {:?}", copy);
            return;
        }

        // keep the destination shadow in step with the device copy
        let src_range = copy.src_offset as usize..(copy.src_offset + copy.size) as usize;
        let staged = self.buffers[&copy.src]
            .shadow
            .as_ref()
            .and_then(|shadow| shadow.get(src_range))
            .map(<[u8]>::to_vec);
        if let (Some(bytes), Some(dst_shadow)) = (
            staged,
            self.buffers
                .get_mut(&copy.dst)
                .and_then(|dst| dst.shadow.as_mut()),
        ) {
            let dst_start = copy.dst_offset as usize;
            if let Some(target) = dst_shadow.get_mut(dst_start..dst_start + bytes.len()) {
                target.copy_from_slice(&bytes);
            }
        }

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("voxel-stream transfer"),
            })
        });
        encoder.copy_buffer_to_buffer(
            &self.buffers[&copy.src].buffer,
            copy.src_offset,
            &self.buffers[&copy.dst].buffer,
            copy.dst_offset,
            copy.size,
        );
    }

    fn flush(&mut self) {
        for entry in self.buffers.values_mut() {
            let (Some(dirty), Some(shadow)) = (entry.dirty.take(), entry.shadow.as_ref()) else {
                continue;
            };
            let start = align_down(dirty.start, wgpu::COPY_BUFFER_ALIGNMENT);
            let end = align_up(dirty.end, wgpu::COPY_BUFFER_ALIGNMENT).min(shadow.len() as u64);
            if start < end {
                self.queue
                    .write_buffer(&entry.buffer, start, &shadow[start as usize..end as usize]);
            }
        }
    }

    fn submit(&mut self) -> Fence {
        self.flush();
        let commands = self.encoder.take().map(|encoder| encoder.finish());
        self.queue.submit(commands);

        self.next_fence += 1;
        let signalled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&signalled);
        self.queue
            .on_submitted_work_done(move || flag.store(true, Ordering::Release));
        self.fences.insert(self.next_fence, signalled);
        Fence(self.next_fence)
    }

    fn is_complete(&mut self, fence: Fence) -> bool {
        self.poll();
        let done = self
            .fences
            .get(&fence.0)
            .map_or(true, |flag| flag.load(Ordering::Acquire));
        if done {
            self.fences.remove(&fence.0);
        }
        done
    }

    fn wait(&mut self, fence: Fence, timeout: Option<Duration>) -> bool {
        let start = Instant::now();
        loop {
            if self.is_complete(fence) {
                return true;
            }
            if timeout.is_some_and(|limit| start.elapsed() >= limit) {
                return false;
            }
            std::thread::yield_now();
        }
    }

    fn free(&mut self, buffer: BufferHandle) {
        if let Some(entry) = self.buffers.remove(&buffer) {
            entry.buffer.destroy();
        }
    }
}
