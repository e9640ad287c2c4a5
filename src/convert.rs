// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::ConvertError,
    image::{ConversionParams, FourCC, Frame, Transform, GREY, RGB3, RGBA, RGBX, YUYV},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
};
use tracing::{debug, warn};

/// Backend-assigned identifier for a submitted conversion job.
pub type NativeRequestId = u64;

/// Completion state reported by a converter backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NativeStatus {
    /// Job accepted, result not produced yet
    Pending,
    /// Result produced and resolvable
    Ready,
    /// Conversion could not be completed
    Failed,
    /// Backend no longer tracks this job
    Unknown,
}

/// Converted pixel data owned by a backend.
///
/// Cloning is cheap: the bytes are shared by reference count, so a buffer
/// handed out before its request is released stays readable for as long as
/// the holder keeps it.
#[derive(Clone, Debug)]
pub struct NativeBuffer(Arc<[u8]>);

impl NativeBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Contract implemented by a conversion backend.
///
/// A backend accepts jobs, executes them outside the caller's control flow,
/// and owns each result buffer until the job is released. All four
/// operations must return without blocking on conversion work.
pub trait Converter: Send + Sync {
    /// Hands a conversion job to the backend and returns its identifier.
    ///
    /// The frame is pinned by reference count until the job finishes, so
    /// the capture side may recycle its slot in the meantime.
    fn submit(
        &self,
        frame: Arc<Frame>,
        params: ConversionParams,
    ) -> Result<NativeRequestId, ConvertError>;

    /// Reports the completion state of a job.
    fn status(&self, id: NativeRequestId) -> NativeStatus;

    /// Resolves the result buffer of a ready job.
    fn resolve(&self, id: NativeRequestId) -> Result<NativeBuffer, ConvertError>;

    /// Releases a job and its result buffer.
    ///
    /// Releasing a job that is still pending cancels it: the eventual
    /// result is dropped, never stored. Releasing an unknown identifier is
    /// a no-op.
    fn release(&self, id: NativeRequestId);
}

#[derive(Copy, Clone)]
struct Pixel {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

// BT.601 full-swing integer approximation
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> Pixel {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    Pixel {
        r: clamp_u8((298 * c + 409 * e + 128) >> 8),
        g: clamp_u8((298 * c - 100 * d - 208 * e + 128) >> 8),
        b: clamp_u8((298 * c + 516 * d + 128) >> 8),
        a: 255,
    }
}

// BT.601 luma weights, scaled to sum to 256
fn luma(p: Pixel) -> u8 {
    ((77 * p.r as u32 + 150 * p.g as u32 + 29 * p.b as u32) >> 8) as u8
}

fn read_pixel(frame: &Frame, x: usize, y: usize) -> Pixel {
    let data = frame.data();
    let w = frame.width() as usize;
    match frame.format() {
        GREY => {
            let v = data[y * w + x];
            Pixel {
                r: v,
                g: v,
                b: v,
                a: 255,
            }
        }
        RGB3 => {
            let i = (y * w + x) * 3;
            Pixel {
                r: data[i],
                g: data[i + 1],
                b: data[i + 2],
                a: 255,
            }
        }
        RGBX => {
            let i = (y * w + x) * 4;
            Pixel {
                r: data[i],
                g: data[i + 1],
                b: data[i + 2],
                a: 255,
            }
        }
        RGBA => {
            let i = (y * w + x) * 4;
            Pixel {
                r: data[i],
                g: data[i + 1],
                b: data[i + 2],
                a: data[i + 3],
            }
        }
        YUYV => {
            // packed pairs: Y0 U Y1 V, chroma shared across each pair
            let row = y * w * 2;
            let pair = row + 4 * (x / 2);
            yuv_to_rgb(data[row + 2 * x], data[pair + 1], data[pair + 3])
        }
        _ => Pixel {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        },
    }
}

fn write_pixel(out: &mut [u8], format: FourCC, px: Pixel) {
    match format {
        GREY => out[0] = luma(px),
        RGB3 => {
            out[0] = px.r;
            out[1] = px.g;
            out[2] = px.b;
        }
        RGBX => {
            out[0] = px.r;
            out[1] = px.g;
            out[2] = px.b;
            out[3] = 255;
        }
        RGBA => {
            out[0] = px.r;
            out[1] = px.g;
            out[2] = px.b;
            out[3] = px.a;
        }
        _ => {}
    }
}

/// Converts a frame synchronously.
///
/// Samples the crop rectangle onto the output grid with nearest-neighbor
/// scaling, applies the mirror transform, and reformats each pixel. This is
/// the kernel the [`CpuConverter`] workers run; it is exposed for callers
/// that want a blocking conversion on the current thread.
///
/// # Errors
///
/// Returns `InvalidArgument` or `UnsupportedFormat` when the parameters do
/// not validate against the frame.
pub fn convert_frame(frame: &Frame, params: &ConversionParams) -> Result<Vec<u8>, ConvertError> {
    params.validate(frame)?;

    let rect = params.input_rect;
    let (ow, oh) = (params.output_width as usize, params.output_height as usize);
    let (rx, ry) = (rect.x as usize, rect.y as usize);
    let (rw, rh) = (rect.width as usize, rect.height as usize);
    let bpp = match params.output_size() {
        Some(size) => size / (ow * oh),
        None => return Err(ConvertError::UnsupportedFormat(params.output_format)),
    };

    let mut out = vec![0u8; ow * oh * bpp];
    for oy in 0..oh {
        for ox in 0..ow {
            let mx = match params.transform {
                Transform::MirrorX | Transform::MirrorBoth => ow - 1 - ox,
                _ => ox,
            };
            let my = match params.transform {
                Transform::MirrorY | Transform::MirrorBoth => oh - 1 - oy,
                _ => oy,
            };
            let sx = rx + mx * rw / ow;
            let sy = ry + my * rh / oh;
            let px = read_pixel(frame, sx, sy);
            let i = (oy * ow + ox) * bpp;
            write_pixel(&mut out[i..i + bpp], params.output_format, px);
        }
    }
    Ok(out)
}

struct Job {
    id: NativeRequestId,
    frame: Arc<Frame>,
    params: ConversionParams,
}

enum JobState {
    Pending,
    Cancelled,
    Ready(NativeBuffer),
    Failed,
}

type JobTable = Arc<Mutex<HashMap<NativeRequestId, JobState>>>;

/// Software conversion backend.
///
/// Runs [`convert_frame`] on a pool of worker threads fed over a channel.
/// Jobs released while still pending are cancelled: the worker drops the
/// produced buffer instead of storing it. Dropping the converter closes the
/// channel and the workers exit on their own.
///
/// # Example
///
/// ```no_run
/// use arcam_convert::convert::{Converter, CpuConverter, NativeStatus};
/// use arcam_convert::image::{ConversionParams, Frame, Rect, Transform, GREY, YUYV};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = CpuConverter::new(2);
/// let frame = Arc::new(Frame::test_pattern(1920, 1080, YUYV)?);
/// let params = ConversionParams {
///     input_rect: Rect { x: 0, y: 0, width: 1920, height: 1080 },
///     output_width: 640,
///     output_height: 480,
///     output_format: GREY,
///     transform: Transform::None,
/// };
///
/// let id = converter.submit(frame, params)?;
/// while converter.status(id) == NativeStatus::Pending {
///     std::thread::sleep(std::time::Duration::from_millis(1));
/// }
/// let buffer = converter.resolve(id)?;
/// assert_eq!(buffer.len(), 640 * 480);
/// converter.release(id);
/// # Ok(())
/// # }
/// ```
pub struct CpuConverter {
    tx: kanal::Sender<Job>,
    jobs: JobTable,
    next_id: AtomicU64,
}

impl CpuConverter {
    /// Starts a converter with the given number of worker threads.
    pub fn new(workers: usize) -> Self {
        let (tx, rx) = kanal::unbounded::<Job>();
        let jobs: JobTable = Arc::new(Mutex::new(HashMap::new()));
        for n in 0..workers.max(1) {
            let rx = rx.clone();
            let jobs = Arc::clone(&jobs);
            thread::spawn(move || {
                debug!(worker = n, "conversion worker started");
                run_worker(&rx, &jobs);
                debug!(worker = n, "conversion worker stopped");
            });
        }
        Self {
            tx,
            jobs,
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of jobs the backend currently tracks.
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

fn run_worker(rx: &kanal::Receiver<Job>, jobs: &JobTable) {
    while let Ok(job) = rx.recv() {
        // cancelled before we got to it
        {
            let mut jobs = jobs.lock().unwrap();
            match jobs.get(&job.id) {
                Some(JobState::Pending) => {}
                Some(JobState::Cancelled) => {
                    jobs.remove(&job.id);
                    debug!(id = job.id, "skipping cancelled conversion");
                    continue;
                }
                _ => continue,
            }
        }

        // run the kernel without holding the table lock
        let outcome = convert_frame(&job.frame, &job.params);

        let mut jobs = jobs.lock().unwrap();
        match jobs.get(&job.id) {
            Some(JobState::Pending) => {
                let state = match outcome {
                    Ok(bytes) => JobState::Ready(NativeBuffer::new(bytes)),
                    Err(e) => {
                        warn!(id = job.id, "conversion failed: {e}");
                        JobState::Failed
                    }
                };
                jobs.insert(job.id, state);
            }
            Some(JobState::Cancelled) => {
                // released mid-flight, drop the result
                jobs.remove(&job.id);
                debug!(id = job.id, "dropping result for cancelled conversion");
            }
            _ => {}
        }
    }
}

impl Converter for CpuConverter {
    fn submit(
        &self,
        frame: Arc<Frame>,
        params: ConversionParams,
    ) -> Result<NativeRequestId, ConvertError> {
        params.validate(&frame)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.jobs.lock().unwrap().insert(id, JobState::Pending);
        if self.tx.send(Job { id, frame, params }).is_err() {
            warn!(id, "worker pool is shut down");
            self.jobs.lock().unwrap().insert(id, JobState::Failed);
        }
        debug!(id, "conversion submitted");
        Ok(id)
    }

    fn status(&self, id: NativeRequestId) -> NativeStatus {
        match self.jobs.lock().unwrap().get(&id) {
            Some(JobState::Pending) => NativeStatus::Pending,
            Some(JobState::Ready(_)) => NativeStatus::Ready,
            Some(JobState::Failed) => NativeStatus::Failed,
            Some(JobState::Cancelled) | None => NativeStatus::Unknown,
        }
    }

    fn resolve(&self, id: NativeRequestId) -> Result<NativeBuffer, ConvertError> {
        match self.jobs.lock().unwrap().get(&id) {
            Some(JobState::Ready(buffer)) => Ok(buffer.clone()),
            Some(JobState::Pending) => Err(ConvertError::NotReady),
            _ => Err(ConvertError::Invalid),
        }
    }

    fn release(&self, id: NativeRequestId) {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get(&id) {
            Some(JobState::Pending) => {
                // the worker owns removal once it sees the cancellation
                jobs.insert(id, JobState::Cancelled);
                debug!(id, "pending conversion cancelled");
            }
            Some(_) => {
                jobs.remove(&id);
            }
            None => {}
        }
    }
}

impl Drop for CpuConverter {
    fn drop(&mut self) {
        let _ = self.tx.close();
        debug!("cpu converter closed");
    }
}
