// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::ConvertError;
use core::fmt;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// Four-character pixel format code.
///
/// Identifies the memory layout of a pixel buffer using the conventional
/// V4L2-style four-byte tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:02x?}", self.0),
        }
    }
}

/// GREY 8-bit single-channel grayscale format
pub const GREY: FourCC = FourCC(*b"GREY");

/// RGB 24-bit pixel format (8 bits per channel, no alpha)
pub const RGB3: FourCC = FourCC(*b"RGB3");

/// RGBX 32-bit pixel format (8 bits per channel, unused alpha)
pub const RGBX: FourCC = FourCC(*b"RGBX");

/// RGBA 32-bit pixel format (8 bits per channel, with alpha)
pub const RGBA: FourCC = FourCC(*b"RGBA");

/// YUYV 4:2:2 YUV packed format (common camera output format)
pub const YUYV: FourCC = FourCC(*b"YUYV");

/// Bytes per pixel for a known format, `None` for unrecognized formats.
pub const fn format_bytes_per_pixel(format: FourCC) -> Option<usize> {
    match format {
        GREY => Some(1),
        YUYV => Some(2),
        RGB3 => Some(3),
        RGBX => Some(4),
        RGBA => Some(4),
        _ => None,
    }
}

const fn format_row_stride(format: FourCC, width: u32) -> Option<usize> {
    match format_bytes_per_pixel(format) {
        Some(bpp) => Some(bpp * width as usize),
        None => None,
    }
}

const fn image_size(width: u32, height: u32, format: FourCC) -> Option<usize> {
    match format_row_stride(format, width) {
        Some(stride) => Some(stride * height as usize),
        None => None,
    }
}

/// Rectangle specification for crop operations.
///
/// Defines a rectangular region within a source frame for cropping or
/// region-of-interest conversions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: i32,
    /// Y coordinate of top-left corner
    pub y: i32,
    /// Width of the rectangle in pixels
    pub width: i32,
    /// Height of the rectangle in pixels
    pub height: i32,
}

/// Mirror transform applied while converting.
///
/// Mirroring is applied during the sampling pass, before pixel
/// reformatting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Transform {
    /// No mirroring
    #[default]
    None,
    /// Flip horizontally (left-right)
    MirrorX,
    /// Flip vertically (top-bottom)
    MirrorY,
    /// Flip both horizontally and vertically (180-degree rotation)
    MirrorBoth,
}

/// Parameters describing a single image conversion.
///
/// Parameters are fixed once a request has been submitted; the subsystem
/// never mutates them afterwards. Only downsampling is supported: the
/// output dimensions must not exceed the crop rectangle on either axis.
/// Scaling is nearest-neighbor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConversionParams {
    /// Region of the source frame to convert
    pub input_rect: Rect,
    /// Output width in pixels
    pub output_width: u32,
    /// Output height in pixels
    pub output_height: u32,
    /// Output pixel format
    pub output_format: FourCC,
    /// Mirror transform applied during sampling
    pub transform: Transform,
}

impl ConversionParams {
    /// Checks the parameters against a source frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the crop rectangle is degenerate or
    /// falls outside the frame, or if the output dimensions are zero or
    /// exceed the crop rectangle. Returns `UnsupportedFormat` if the
    /// output format is not renderable.
    pub fn validate(&self, frame: &Frame) -> Result<(), ConvertError> {
        let rect = self.input_rect;
        if rect.x < 0 || rect.y < 0 || rect.width <= 0 || rect.height <= 0 {
            return Err(ConvertError::InvalidArgument(format!(
                "degenerate crop rect {}x{}+{}+{}",
                rect.width, rect.height, rect.x, rect.y
            )));
        }
        if rect.x as i64 + rect.width as i64 > frame.width() as i64
            || rect.y as i64 + rect.height as i64 > frame.height() as i64
        {
            return Err(ConvertError::InvalidArgument(format!(
                "crop rect {}x{}+{}+{} outside {}x{} frame",
                rect.width,
                rect.height,
                rect.x,
                rect.y,
                frame.width(),
                frame.height()
            )));
        }
        if self.output_width == 0 || self.output_height == 0 {
            return Err(ConvertError::InvalidArgument(format!(
                "degenerate output size {}x{}",
                self.output_width, self.output_height
            )));
        }
        if self.output_width as i64 > rect.width as i64
            || self.output_height as i64 > rect.height as i64
        {
            return Err(ConvertError::InvalidArgument(format!(
                "output {}x{} exceeds crop rect {}x{}, only downsampling is supported",
                self.output_width, self.output_height, rect.width, rect.height
            )));
        }
        // YUYV shares chroma between pixel pairs and is not a render target
        if self.output_format == YUYV || format_bytes_per_pixel(self.output_format).is_none() {
            return Err(ConvertError::UnsupportedFormat(self.output_format));
        }
        Ok(())
    }

    /// Row stride of the output buffer in bytes.
    pub fn output_stride(&self) -> Option<usize> {
        format_row_stride(self.output_format, self.output_width)
    }

    /// Total size of the output buffer in bytes.
    pub fn output_size(&self) -> Option<usize> {
        image_size(self.output_width, self.output_height, self.output_format)
    }
}

/// An owned source camera frame.
///
/// `Frame` holds the raw pixel data of a single captured frame along with
/// its dimensions and pixel format. Frames handed to the conversion
/// subsystem are shared by reference count, so a frame stays alive for as
/// long as any in-flight conversion still reads from it.
///
/// # Example
///
/// ```
/// use arcam_convert::image::{Frame, YUYV};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let frame = Frame::test_pattern(1920, 1080, YUYV)?;
///
/// assert_eq!(frame.width(), 1920);
/// assert_eq!(frame.height(), 1080);
/// assert_eq!(frame.format(), YUYV);
/// assert_eq!(frame.size(), 4147200);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    format: FourCC,
    data: Box<[u8]>,
}

impl Frame {
    /// Wraps raw pixel data in a frame.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for an unrecognized pixel format, and
    /// `InvalidArgument` when the buffer length does not match the
    /// dimensions, or for a YUYV frame with an odd width.
    pub fn new(
        width: u32,
        height: u32,
        format: FourCC,
        data: Vec<u8>,
    ) -> Result<Self, ConvertError> {
        let Some(size) = image_size(width, height, format) else {
            return Err(ConvertError::UnsupportedFormat(format));
        };
        if format == YUYV && width % 2 != 0 {
            return Err(ConvertError::InvalidArgument(format!(
                "YUYV frame width {width} must be even"
            )));
        }
        if data.len() != size {
            return Err(ConvertError::InvalidArgument(format!(
                "{}x{} {} frame needs {} bytes, got {}",
                width,
                height,
                format,
                size,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data: data.into_boxed_slice(),
        })
    }

    /// Generates a synthetic gradient frame.
    ///
    /// Useful as a stand-in camera source for demos, tests, and benchmarks.
    pub fn test_pattern(width: u32, height: u32, format: FourCC) -> Result<Self, ConvertError> {
        let Some(size) = image_size(width, height, format) else {
            return Err(ConvertError::UnsupportedFormat(format));
        };
        let mut data = vec![0u8; size];
        let (w, h) = (width as usize, height as usize);
        match format {
            GREY => {
                for y in 0..h {
                    for x in 0..w {
                        data[y * w + x] = ((x + y) & 0xff) as u8;
                    }
                }
            }
            YUYV => {
                for y in 0..h {
                    for x in 0..w {
                        data[(y * w + x) * 2] = ((x + y) & 0xff) as u8;
                        data[(y * w + x) * 2 + 1] = 128;
                    }
                }
            }
            RGB3 | RGBX | RGBA => {
                let bpp = size / (w * h).max(1);
                for y in 0..h {
                    for x in 0..w {
                        let i = (y * w + x) * bpp;
                        data[i] = (x & 0xff) as u8;
                        data[i + 1] = (y & 0xff) as u8;
                        data[i + 2] = ((x + y) & 0xff) as u8;
                        if bpp == 4 {
                            data[i + 3] = 255;
                        }
                    }
                }
            }
            _ => return Err(ConvertError::UnsupportedFormat(format)),
        }
        Self::new(width, height, format, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> FourCC {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn row_stride(&self) -> usize {
        format_row_stride(self.format, self.width).unwrap_or(0)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {} bytes",
            self.width,
            self.height,
            self.format,
            self.data.len()
        )
    }
}

/// Identifier referencing a frame held by a [`FrameSource`].
///
/// The default handle references nothing and never resolves.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Source of camera frames for the conversion subsystem.
///
/// Implemented by whatever owns the capture path: a live camera reader, a
/// playback source, or the in-memory [`FramePool`]. The source also
/// advertises which output pixel formats conversions may target.
pub trait FrameSource: Send + Sync {
    /// Resolves a handle to the frame it references, if still live.
    fn frame(&self, handle: FrameHandle) -> Option<Arc<Frame>>;

    /// Output pixel formats supported for conversions from this source.
    fn output_formats(&self) -> &[FourCC];
}

struct PoolInner {
    frames: VecDeque<(u64, Arc<Frame>)>,
    next_id: u64,
}

/// Bounded in-memory frame source.
///
/// Holds the most recent frames up to a fixed capacity; inserting beyond
/// capacity recycles the oldest frame and invalidates its handle. Handles
/// are never reused. Conversions pin their source frame by reference
/// count, so recycling a frame does not disturb a conversion already
/// submitted against it.
pub struct FramePool {
    inner: Mutex<PoolInner>,
    formats: Vec<FourCC>,
    capacity: usize,
}

impl FramePool {
    /// Creates a pool advertising the default renderable output formats.
    pub fn new(capacity: usize) -> Self {
        Self::with_formats(capacity, vec![GREY, RGB3, RGBX, RGBA])
    }

    /// Creates a pool advertising a custom set of output formats.
    pub fn with_formats(capacity: usize, formats: Vec<FourCC>) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                frames: VecDeque::new(),
                next_id: 1,
            }),
            formats,
            capacity: capacity.max(1),
        }
    }

    /// Adds a frame, recycling the oldest one if the pool is full.
    pub fn insert(&self, frame: Frame) -> FrameHandle {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.frames.push_back((id, Arc::new(frame)));
        while inner.frames.len() > self.capacity {
            if let Some((old, _)) = inner.frames.pop_front() {
                debug!(handle = old, "frame recycled");
            }
        }
        FrameHandle(id)
    }

    /// Drops a frame from the pool ahead of recycling.
    pub fn invalidate(&self, handle: FrameHandle) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.retain(|(id, _)| *id != handle.0);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSource for FramePool {
    fn frame(&self, handle: FrameHandle) -> Option<Arc<Frame>> {
        let inner = self.inner.lock().unwrap();
        inner
            .frames
            .iter()
            .find(|(id, _)| *id == handle.0)
            .map(|(_, frame)| Arc::clone(frame))
    }

    fn output_formats(&self) -> &[FourCC] {
        &self.formats
    }
}
