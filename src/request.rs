// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    convert::{Converter, NativeBuffer, NativeRequestId, NativeStatus},
    error::ConvertError,
    image::{ConversionParams, FourCC, FrameHandle, FrameSource},
};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Opaque identifier for a tracked conversion request.
///
/// Handles are plain copyable values and stay valid to *use* forever: a
/// handle whose request has been disposed simply reports
/// [`RequestStatus::Disposed`] from then on. The default handle references
/// nothing; polling it reports `Disposed` and disposing it is a no-op, so
/// callers may keep a default-constructed request value around safely.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    index: u32,
    generation: u32,
}

impl RequestHandle {
    /// Whether this is the default handle that references nothing.
    pub fn is_null(&self) -> bool {
        self.generation == 0
    }
}

/// Observable state of a conversion request.
///
/// Transitions are monotonic: `Pending` moves to `Ready` or `Failed` at
/// most once, and any state moves to `Disposed` permanently.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Submitted, conversion still running
    Pending,
    /// Conversion finished, result readable
    Ready,
    /// Conversion could not be completed
    Failed,
    /// Request released by the caller
    Disposed,
}

/// Zero-copy view of a conversion result.
///
/// The view shares the backend's result buffer by reference count: a view
/// obtained before its request was disposed stays readable, but the
/// manager hands out no new views for that request afterwards.
#[derive(Clone, Debug)]
pub struct ResultView {
    data: NativeBuffer,
    width: u32,
    height: u32,
    format: FourCC,
    stride: usize,
}

impl ResultView {
    /// Raw converted bytes, `row_stride() * height()` long.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Reinterprets the bytes as a slice of a caller-chosen element type.
    ///
    /// This is a reinterpretation only, no numeric conversion happens.
    /// Returns `None` when the buffer length or alignment does not suit
    /// `T`.
    pub fn reinterpret<T: bytemuck::Pod>(&self) -> Option<&[T]> {
        bytemuck::try_cast_slice(self.bytes()).ok()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
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

    /// Length of one output row in bytes.
    pub fn row_stride(&self) -> usize {
        self.stride
    }
}

enum Phase {
    Pending,
    // result buffer cached on first resolve so exactly one exists
    Ready(Option<NativeBuffer>),
    Failed,
}

enum SlotState {
    Vacant,
    Live {
        native: NativeRequestId,
        params: ConversionParams,
        phase: Phase,
    },
}

struct Slot {
    // bumped on dispose, so stale handles miss forever
    generation: u32,
    state: SlotState,
}

/// Tracks in-flight conversion requests against a converter backend.
///
/// The manager mediates between per-frame callers and an opaque
/// [`Converter`]: submission validates parameters and hands the job over,
/// polling observes completion without blocking, result access is
/// zero-copy, and disposal releases the backend buffer at a moment the
/// caller chooses. Every operation returns without waiting on conversion
/// work.
///
/// Internally each request lives in a table slot carrying a generation
/// counter. Disposal bumps the generation, so a stale handle can never
/// reach another request's state, even after the slot is reused. Slots are
/// locked individually: a read and a dispose racing on one handle
/// serialize against each other without stalling unrelated requests.
///
/// # Example
///
/// ```no_run
/// use arcam_convert::convert::CpuConverter;
/// use arcam_convert::image::{ConversionParams, Frame, FramePool, Rect, Transform, GREY, YUYV};
/// use arcam_convert::request::{ConversionManager, RequestStatus};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = Arc::new(FramePool::new(4));
/// let manager = ConversionManager::new(pool.clone(), Arc::new(CpuConverter::new(2)));
///
/// let frame = pool.insert(Frame::test_pattern(1920, 1080, YUYV)?);
/// let request = manager.submit(
///     frame,
///     ConversionParams {
///         input_rect: Rect { x: 0, y: 0, width: 1920, height: 1080 },
///         output_width: 640,
///         output_height: 480,
///         output_format: GREY,
///         transform: Transform::None,
///     },
/// )?;
///
/// // poll once per frame until the conversion settles
/// loop {
///     match manager.poll_status(request) {
///         RequestStatus::Pending => std::thread::sleep(std::time::Duration::from_millis(1)),
///         RequestStatus::Ready => break,
///         status => panic!("conversion did not complete: {status:?}"),
///     }
/// }
///
/// let view = manager.result_view(request)?;
/// assert_eq!(view.len(), 640 * 480);
/// manager.dispose(request);
/// # Ok(())
/// # }
/// ```
pub struct ConversionManager {
    source: Arc<dyn FrameSource>,
    converter: Arc<dyn Converter>,
    slots: RwLock<Vec<Arc<Mutex<Slot>>>>,
    free: Mutex<Vec<u32>>,
}

impl ConversionManager {
    /// Creates a manager over a frame source and a converter backend.
    pub fn new(source: Arc<dyn FrameSource>, converter: Arc<dyn Converter>) -> Self {
        Self {
            source,
            converter,
            slots: RwLock::new(Vec::new()),
            free: Mutex::new(Vec::new()),
        }
    }

    /// Submits a conversion request.
    ///
    /// Returns immediately with a handle whose status starts out
    /// `Pending`; the conversion itself runs outside the caller's control
    /// flow and completion is observed through [`Self::poll_status`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the frame handle is stale or the
    /// parameters do not validate against the frame, and
    /// `UnsupportedFormat` when the output format is outside the set the
    /// frame source advertises. No request is tracked on failure.
    pub fn submit(
        &self,
        frame: FrameHandle,
        params: ConversionParams,
    ) -> Result<RequestHandle, ConvertError> {
        let frame = self.source.frame(frame).ok_or_else(|| {
            ConvertError::InvalidArgument("source frame handle is no longer valid".into())
        })?;
        params.validate(&frame)?;
        if !self.source.output_formats().contains(&params.output_format) {
            return Err(ConvertError::UnsupportedFormat(params.output_format));
        }

        let native = self.converter.submit(frame, params)?;
        let (index, generation) = self.allocate(native, params);
        debug!(index, generation, native, "conversion request submitted");
        Ok(RequestHandle { index, generation })
    }

    /// Reports the status of a request.
    ///
    /// Observably side-effect-free and safe to call any number of times
    /// from any thread, including after disposal.
    pub fn poll_status(&self, handle: RequestHandle) -> RequestStatus {
        let Some(cell) = self.slot(handle) else {
            return RequestStatus::Disposed;
        };
        let mut slot = cell.lock().unwrap();
        if slot.generation != handle.generation {
            return RequestStatus::Disposed;
        }
        let SlotState::Live { native, phase, .. } = &mut slot.state else {
            return RequestStatus::Disposed;
        };
        match phase {
            Phase::Ready(_) => RequestStatus::Ready,
            Phase::Failed => RequestStatus::Failed,
            Phase::Pending => match self.converter.status(*native) {
                NativeStatus::Pending => RequestStatus::Pending,
                NativeStatus::Ready => {
                    *phase = Phase::Ready(None);
                    RequestStatus::Ready
                }
                NativeStatus::Failed | NativeStatus::Unknown => {
                    *phase = Phase::Failed;
                    RequestStatus::Failed
                }
            },
        }
    }

    /// Returns a zero-copy view of a completed conversion.
    ///
    /// Call [`Self::poll_status`] until it reports `Ready` first; polling
    /// is the only operation that observes completion.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` when the request has not been polled to `Ready`
    /// (including failed requests), `Disposed` when the request has been
    /// released, and `Invalid` when the backend reported ready but the
    /// result buffer cannot be resolved or has an unexpected length.
    pub fn result_view(&self, handle: RequestHandle) -> Result<ResultView, ConvertError> {
        let cell = self.slot(handle).ok_or(ConvertError::Disposed)?;
        let mut slot = cell.lock().unwrap();
        if slot.generation != handle.generation {
            return Err(ConvertError::Disposed);
        }
        let SlotState::Live { native, params, phase } = &mut slot.state else {
            return Err(ConvertError::Disposed);
        };
        let Phase::Ready(cached) = phase else {
            return Err(ConvertError::NotReady);
        };

        let expected = params.output_size().ok_or(ConvertError::Invalid)?;
        let data = match cached {
            Some(buffer) => buffer.clone(),
            None => {
                let buffer = match self.converter.resolve(*native) {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        warn!(native = *native, "result buffer unresolvable: {e}");
                        return Err(ConvertError::Invalid);
                    }
                };
                if buffer.len() != expected {
                    warn!(
                        native = *native,
                        expected,
                        got = buffer.len(),
                        "result buffer has unexpected length"
                    );
                    return Err(ConvertError::Invalid);
                }
                *cached = Some(buffer.clone());
                buffer
            }
        };

        Ok(ResultView {
            data,
            width: params.output_width,
            height: params.output_height,
            format: params.output_format,
            stride: params.output_stride().unwrap_or(0),
        })
    }

    /// Releases a request and its result buffer.
    ///
    /// Idempotent: disposing an already-disposed or default handle is a
    /// no-op. Disposing a request that is still pending cancels it; the
    /// conversion's eventual result is dropped and the status stays
    /// `Disposed`. After disposal the backend buffer is gone, but views
    /// handed out earlier keep their shared bytes readable.
    pub fn dispose(&self, handle: RequestHandle) {
        let Some(cell) = self.slot(handle) else {
            return;
        };
        let mut slot = cell.lock().unwrap();
        if slot.generation != handle.generation {
            return;
        }
        slot.generation += 1;
        let state = std::mem::replace(&mut slot.state, SlotState::Vacant);
        drop(slot);
        if let SlotState::Live { native, .. } = state {
            self.converter.release(native);
            debug!(index = handle.index, native, "conversion request disposed");
        }
        self.free.lock().unwrap().push(handle.index);
    }

    /// Number of tracked, undisposed requests.
    pub fn live_requests(&self) -> usize {
        let slots = self.slots.read().unwrap();
        slots
            .iter()
            .filter(|cell| matches!(cell.lock().unwrap().state, SlotState::Live { .. }))
            .count()
    }

    fn slot(&self, handle: RequestHandle) -> Option<Arc<Mutex<Slot>>> {
        if handle.is_null() {
            return None;
        }
        self.slots.read().unwrap().get(handle.index as usize).cloned()
    }

    fn allocate(&self, native: NativeRequestId, params: ConversionParams) -> (u32, u32) {
        let state = SlotState::Live {
            native,
            params,
            phase: Phase::Pending,
        };
        let reused = self.free.lock().unwrap().pop();
        if let Some(index) = reused {
            let cell = self.slot_cell(index);
            let mut slot = cell.lock().unwrap();
            slot.generation += 1;
            slot.state = state;
            return (index, slot.generation);
        }
        let mut slots = self.slots.write().unwrap();
        let index = slots.len() as u32;
        slots.push(Arc::new(Mutex::new(Slot {
            generation: 1,
            state,
        })));
        (index, 1)
    }

    fn slot_cell(&self, index: u32) -> Arc<Mutex<Slot>> {
        Arc::clone(&self.slots.read().unwrap()[index as usize])
    }
}
