// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use arcam_convert::image::{FourCC, Transform, GREY, RGB3, RGBA, RGBX, YUYV};
use clap::Parser;

/// Camera image mirroring options.
///
/// Determines how the image should be flipped during conversion. Useful
/// for correcting camera orientation.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum MirrorSetting {
    /// No mirroring
    None,
    /// Flip horizontally (left-right)
    Horizontal,
    /// Flip vertically (top-bottom)
    Vertical,
    /// Flip both horizontally and vertically (180-degree rotation)
    Both,
}

impl From<MirrorSetting> for Transform {
    fn from(value: MirrorSetting) -> Self {
        match value {
            MirrorSetting::None => Transform::None,
            MirrorSetting::Horizontal => Transform::MirrorX,
            MirrorSetting::Vertical => Transform::MirrorY,
            MirrorSetting::Both => Transform::MirrorBoth,
        }
    }
}

/// Pixel format options.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum FormatSetting {
    /// 8-bit grayscale
    Grey,
    /// 24-bit RGB
    Rgb,
    /// 32-bit RGB with unused alpha
    Rgbx,
    /// 32-bit RGBA
    Rgba,
    /// Packed 4:2:2 YUV (source only)
    Yuyv,
}

impl From<FormatSetting> for FourCC {
    fn from(value: FormatSetting) -> Self {
        match value {
            FormatSetting::Grey => GREY,
            FormatSetting::Rgb => RGB3,
            FormatSetting::Rgbx => RGBX,
            FormatSetting::Rgba => RGBA,
            FormatSetting::Yuyv => YUYV,
        }
    }
}

/// Command-line arguments for the Arcam conversion demo.
///
/// Drives a synthetic camera through the conversion subsystem: frames are
/// generated at the capture rate, converted on the worker pool, and
/// reported once per tick. Arguments can be specified via command line or
/// environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// arcam-convert --camera-size 3840 2160 --stream-size 1280 720 --verbose
///
/// # Via environment variables
/// export CAMERA_SIZE="3840 2160"
/// export STREAM_FORMAT=grey
/// arcam-convert
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera capture resolution in pixels (width height)
    #[arg(
        long,
        env = "CAMERA_SIZE",
        default_value = "1920 1080",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub camera_size: Vec<u32>,

    /// Camera source pixel format
    #[arg(long, env = "CAMERA_FORMAT", default_value = "yuyv", value_enum)]
    pub camera_format: FormatSetting,

    /// Output conversion resolution in pixels (width height)
    #[arg(
        short,
        long,
        env = "STREAM_SIZE",
        default_value = "640 480",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub stream_size: Vec<u32>,

    /// Output pixel format
    #[arg(long, env = "STREAM_FORMAT", default_value = "rgba", value_enum)]
    pub stream_format: FormatSetting,

    /// Image mirroring applied during conversion
    #[arg(long, env = "MIRROR", default_value = "none", value_enum)]
    pub mirror: MirrorSetting,

    /// Conversion worker threads
    #[arg(long, env = "WORKERS", default_value = "2")]
    pub workers: usize,

    /// Source frame pool capacity
    #[arg(long, env = "POOL_SIZE", default_value = "4")]
    pub pool_size: usize,

    /// Synthetic camera frame rate (frames per second)
    #[arg(long, env = "FPS", default_value = "30")]
    pub fps: u32,

    /// Number of frames to process before exiting (0 runs forever)
    #[arg(long, env = "FRAMES", default_value = "0")]
    pub frames: u64,

    /// Enable verbose per-frame statistics
    #[arg(short, long)]
    pub verbose: bool,
}
