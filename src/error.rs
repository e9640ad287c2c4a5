// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::image::FourCC;
use thiserror::Error;

/// Errors reported by the conversion subsystem.
///
/// These are synchronous, local failures detected at the call site and are
/// never retried. A conversion that cannot be completed is not an error at
/// all: it surfaces as the `Failed` request status through polling, so
/// per-frame callers react with a plain status check instead of error
/// control flow across the asynchronous boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Malformed conversion parameters or a stale source frame handle.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output format outside the set advertised by the frame source.
    #[error("unsupported output format {0}")]
    UnsupportedFormat(FourCC),

    /// Result requested before the request completed.
    #[error("conversion result not ready")]
    NotReady,

    /// Operation attempted on a released request.
    #[error("conversion request disposed")]
    Disposed,

    /// Backend reported ready but the result buffer could not be resolved.
    #[error("native result buffer could not be resolved")]
    Invalid,
}
