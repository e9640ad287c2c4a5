// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # Arcam Conversion Library
//!
//! This library provides asynchronous camera-image conversion for AR
//! capture pipelines. Callers submit conversion jobs against source frames,
//! poll completion once per frame tick, read results through zero-copy
//! views, and release the result buffers at a moment of their choosing.
//!
//! ## Features
//!
//! - **Request Lifecycle Management**: Submit, poll, read, and dispose
//!   conversion requests without ever blocking on the conversion itself.
//! - **Pluggable Backends**: The `Converter` trait abstracts the component
//!   doing the pixel work; a software worker-pool backend is included and
//!   hardware-accelerated backends slot in behind the same contract.
//! - **Zero-Copy Results**: Result views share the backend's buffer by
//!   reference count and reinterpret to caller-chosen element types
//!   without copying or converting.
//! - **Frame Pooling**: A bounded frame pool recycles old capture frames
//!   while reference counting keeps in-flight conversions safe.
//!
//! ## Example
//!
//! ```no_run
//! use arcam_convert::convert::CpuConverter;
//! use arcam_convert::image::{ConversionParams, Frame, FramePool, Rect, Transform, RGBA, YUYV};
//! use arcam_convert::request::{ConversionManager, RequestStatus};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(FramePool::new(4));
//! let manager = ConversionManager::new(pool.clone(), Arc::new(CpuConverter::new(2)));
//!
//! // convert a captured frame down to a 640x480 RGBA preview
//! let frame = pool.insert(Frame::test_pattern(1920, 1080, YUYV)?);
//! let request = manager.submit(
//!     frame,
//!     ConversionParams {
//!         input_rect: Rect { x: 0, y: 0, width: 1920, height: 1080 },
//!         output_width: 640,
//!         output_height: 480,
//!         output_format: RGBA,
//!         transform: Transform::None,
//!     },
//! )?;
//!
//! while manager.poll_status(request) == RequestStatus::Pending {
//!     std::thread::sleep(std::time::Duration::from_millis(1));
//! }
//! let view = manager.result_view(request)?;
//! assert_eq!(view.len(), 640 * 480 * 4);
//! manager.dispose(request);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! Conversion is expensive relative to a frame tick, so the manager never
//! waits on it: completion is observed only by polling. Result buffers are
//! proportional to image resolution, so they are released only by explicit
//! disposal rather than whenever a collector gets around to it. Disposed
//! requests are detected through per-slot generation counters, which makes
//! stale handles harmless by construction.

pub mod convert;
pub mod error;
pub mod image;
pub mod request;
