// src/platform/framebuffer.rs

//! Pixel storage shared by both backends.
//!
//! Pixels are 4 bytes each, little-endian BGRX (XRGB8888), top-left origin,
//! rows `stride` bytes apart. Storage is never resized in place: a new size
//! always means destroying the old buffer and allocating a fresh one.

use anyhow::Result;
use log::debug;

/// Bytes per pixel of every framebuffer.
pub const BYTES_PER_PIXEL: usize = 4;

/// A borrowed view of the current frame, handed to the drawing layer.
pub struct RenderTarget<'a> {
    pub pixels: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    /// Bytes per row. Always at least `width * 4`.
    pub stride: usize,
}

impl<'a> RenderTarget<'a> {
    /// Fills the whole frame with one 0xAARRGGBB colour.
    pub fn clear(&mut self, argb: u32) {
        self.fill_rect(0, 0, self.width, self.height, argb);
    }

    /// Fills a rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, argb: u32) {
        let x0 = x.clamp(0, self.width as i64) as usize;
        let y0 = y.clamp(0, self.height as i64) as usize;
        let x1 = (x + w as i64).clamp(0, self.width as i64) as usize;
        let y1 = (y + h as i64).clamp(0, self.height as i64) as usize;
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let bytes = argb.to_le_bytes();
        for row in y0..y1 {
            let start = row * self.stride + x0 * BYTES_PER_PIXEL;
            let end = row * self.stride + x1 * BYTES_PER_PIXEL;
            for px in self.pixels[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&bytes);
            }
        }
    }

    /// Reads back one pixel as 0xAARRGGBB, if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        let px = self.pixels.get(i..i + BYTES_PER_PIXEL)?;
        Some(u32::from_le_bytes([px[0], px[1], px[2], px[3]]))
    }
}

/// A fixed-size pixel store.
///
/// Implementations release their resources on drop, in the order their
/// backing requires.
pub trait FrameStorage: Sized {
    fn allocate(width: u32, height: u32) -> Result<Self>;
    fn size(&self) -> (u32, u32);
    fn stride(&self) -> usize;
    fn pixels_mut(&mut self) -> &mut [u8];
}

/// Client-owned heap storage (the X11 strategy: pixels are copied to the
/// server with `XPutImage`).
pub struct HeapBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl FrameStorage for HeapBuffer {
    fn allocate(width: u32, height: u32) -> Result<Self> {
        let stride = width as usize * BYTES_PER_PIXEL;
        Ok(HeapBuffer {
            data: vec![0; stride * height as usize],
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
        &mut self.data
    }
}

/// The one place a backend's framebuffer is (re)allocated.
///
/// Both server-driven and application-driven resizes go through
/// [`FramebufferSlot::ensure_size`].
pub struct FramebufferSlot<B: FrameStorage> {
    buffer: Option<B>,
    allocations: usize,
}

impl<B: FrameStorage> Default for FramebufferSlot<B> {
    fn default() -> Self {
        FramebufferSlot {
            buffer: None,
            allocations: 0,
        }
    }
}

impl<B: FrameStorage> FramebufferSlot<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the slot hold a buffer of exactly `width x height`.
    ///
    /// Returns `Ok(false)` without touching anything when the size is
    /// unchanged. Otherwise the old buffer is destroyed before the new one
    /// is allocated, and `Ok(true)` is returned.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> Result<bool> {
        if let Some(current) = &self.buffer {
            if current.size() == (width, height) {
                return Ok(false);
            }
        }
        if let Some(old) = self.buffer.take() {
            let (ow, oh) = old.size();
            debug!("Destroying {}x{} framebuffer", ow, oh);
            drop(old);
        }
        if width == 0 || height == 0 {
            debug!("Framebuffer released for empty size {}x{}", width, height);
            return Ok(true);
        }
        let buffer = B::allocate(width, height)?;
        self.allocations += 1;
        debug!(
            "Allocated {}x{} framebuffer (stride {}, allocation #{})",
            width,
            height,
            buffer.stride(),
            self.allocations
        );
        self.buffer = Some(buffer);
        Ok(true)
    }

    /// Drops the current buffer, if any.
    pub fn release(&mut self) {
        self.buffer = None;
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> Option<&mut B> {
        self.buffer.as_mut()
    }

    /// Borrows the buffer as a render target.
    pub fn target(&mut self) -> Option<RenderTarget<'_>> {
        let buffer = self.buffer.as_mut()?;
        let (width, height) = buffer.size();
        let stride = buffer.stride();
        Some(RenderTarget {
            pixels: buffer.pixels_mut(),
            width,
            height,
            stride,
        })
    }
}
