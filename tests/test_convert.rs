// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use arcam_convert::{
    convert::{convert_frame, CpuConverter},
    error::ConvertError,
    image::{
        ConversionParams, Frame, FramePool, Rect, Transform, GREY, RGB3, RGBA, RGBX, YUYV,
    },
    request::{ConversionManager, RequestHandle, RequestStatus},
};
use serial_test::serial;
use std::{
    error::Error,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

fn full_rect(width: u32, height: u32) -> Rect {
    Rect {
        x: 0,
        y: 0,
        width: width as i32,
        height: height as i32,
    }
}

fn wait_terminal(manager: &ConversionManager, request: RequestHandle) -> RequestStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match manager.poll_status(request) {
            RequestStatus::Pending => {
                assert!(Instant::now() < deadline, "conversion did not settle");
                thread::sleep(Duration::from_millis(1));
            }
            status => return status,
        }
    }
}

#[test]
fn test_frame_sizes() -> Result<(), Box<dyn Error>> {
    let frame = Frame::test_pattern(1920, 1080, GREY)?;
    println!("{}", frame);
    assert_eq!(frame.size(), 2073600);

    let frame = Frame::test_pattern(1920, 1080, YUYV)?;
    println!("{}", frame);
    assert_eq!(frame.size(), 4147200);

    let frame = Frame::test_pattern(1920, 1080, RGB3)?;
    println!("{}", frame);
    assert_eq!(frame.size(), 6220800);

    let frame = Frame::test_pattern(1920, 1080, RGBA)?;
    println!("{}", frame);
    assert_eq!(frame.size(), 8294400);

    Ok(())
}

#[test]
fn test_frame_length_validation() -> Result<(), Box<dyn Error>> {
    let err = Frame::new(640, 480, GREY, vec![0u8; 100]).unwrap_err();
    assert!(matches!(err, ConvertError::InvalidArgument(_)));

    let err = Frame::new(641, 480, YUYV, vec![0u8; 641 * 480 * 2]).unwrap_err();
    assert!(matches!(err, ConvertError::InvalidArgument(_)));
    Ok(())
}

#[test]
fn test_yuyv_to_rgba_decode() -> Result<(), Box<dyn Error>> {
    // solid BT.601 red: Y=81 U=90 V=240
    let mut data = Vec::new();
    for _ in 0..4 {
        data.extend_from_slice(&[81, 90, 81, 240]);
    }
    let frame = Frame::new(4, 2, YUYV, data)?;
    let params = ConversionParams {
        input_rect: full_rect(4, 2),
        output_width: 4,
        output_height: 2,
        output_format: RGBA,
        transform: Transform::None,
    };

    let out = convert_frame(&frame, &params)?;
    assert_eq!(out.len(), 4 * 2 * 4);
    for px in out.chunks_exact(4) {
        assert_eq!(px, [255, 0, 0, 255]);
    }
    Ok(())
}

#[test]
fn test_rgba_to_grey_luma() -> Result<(), Box<dyn Error>> {
    let mut data = Vec::new();
    for _ in 0..4 {
        data.extend_from_slice(&[255, 0, 0, 255]);
    }
    let frame = Frame::new(2, 2, RGBA, data)?;
    let params = ConversionParams {
        input_rect: full_rect(2, 2),
        output_width: 2,
        output_height: 2,
        output_format: GREY,
        transform: Transform::None,
    };

    // BT.601 red weight: 77 * 255 >> 8
    let out = convert_frame(&frame, &params)?;
    assert_eq!(out, vec![76; 4]);
    Ok(())
}

#[test]
fn test_grey_to_rgbx() -> Result<(), Box<dyn Error>> {
    let frame = Frame::new(1, 1, GREY, vec![100])?;
    let params = ConversionParams {
        input_rect: full_rect(1, 1),
        output_width: 1,
        output_height: 1,
        output_format: RGBX,
        transform: Transform::None,
    };

    assert_eq!(convert_frame(&frame, &params)?, vec![100, 100, 100, 255]);
    Ok(())
}

#[test]
fn test_mirror_x() -> Result<(), Box<dyn Error>> {
    let frame = Frame::new(2, 1, RGB3, vec![10, 0, 0, 200, 0, 0])?;
    let params = ConversionParams {
        input_rect: full_rect(2, 1),
        output_width: 2,
        output_height: 1,
        output_format: RGB3,
        transform: Transform::MirrorX,
    };

    assert_eq!(convert_frame(&frame, &params)?, vec![200, 0, 0, 10, 0, 0]);
    Ok(())
}

#[test]
fn test_mirror_y() -> Result<(), Box<dyn Error>> {
    let frame = Frame::new(1, 2, GREY, vec![10, 200])?;
    let params = ConversionParams {
        input_rect: full_rect(1, 2),
        output_width: 1,
        output_height: 2,
        output_format: GREY,
        transform: Transform::MirrorY,
    };

    assert_eq!(convert_frame(&frame, &params)?, vec![200, 10]);
    Ok(())
}

#[test]
fn test_nearest_neighbor_picks_top_left() -> Result<(), Box<dyn Error>> {
    let frame = Frame::new(2, 2, GREY, vec![10, 20, 30, 40])?;
    let params = ConversionParams {
        input_rect: full_rect(2, 2),
        output_width: 1,
        output_height: 1,
        output_format: GREY,
        transform: Transform::None,
    };

    assert_eq!(convert_frame(&frame, &params)?, vec![10]);
    Ok(())
}

#[test]
fn test_crop_rect_sampling() -> Result<(), Box<dyn Error>> {
    let data: Vec<u8> = (0..16).collect();
    let frame = Frame::new(4, 4, GREY, data)?;
    let params = ConversionParams {
        input_rect: Rect {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        },
        output_width: 1,
        output_height: 1,
        output_format: GREY,
        transform: Transform::None,
    };

    // value at (2,2) in row-major order
    assert_eq!(convert_frame(&frame, &params)?, vec![10]);
    Ok(())
}

#[test]
fn test_kernel_rejects_invalid_params() -> Result<(), Box<dyn Error>> {
    let frame = Frame::test_pattern(640, 480, GREY)?;
    let params = ConversionParams {
        input_rect: Rect {
            x: 0,
            y: 0,
            width: 700,
            height: 480,
        },
        output_width: 320,
        output_height: 240,
        output_format: GREY,
        transform: Transform::None,
    };

    assert!(matches!(
        convert_frame(&frame, &params),
        Err(ConvertError::InvalidArgument(_))
    ));
    Ok(())
}

#[test]
#[serial]
fn test_grayscale_downsample_pipeline() -> Result<(), Box<dyn Error>> {
    let pool = Arc::new(FramePool::new(4));
    let converter = Arc::new(CpuConverter::new(2));
    let manager = ConversionManager::new(pool.clone(), converter.clone());

    let frame = pool.insert(Frame::test_pattern(640, 480, GREY)?);
    let request = manager.submit(
        frame,
        ConversionParams {
            input_rect: full_rect(640, 480),
            output_width: 320,
            output_height: 240,
            output_format: GREY,
            transform: Transform::None,
        },
    )?;

    assert_eq!(wait_terminal(&manager, request), RequestStatus::Ready);
    let view = manager.result_view(request)?;
    assert_eq!(view.len(), 76800);
    assert_eq!(view.row_stride(), 320);

    manager.dispose(request);
    assert_eq!(manager.poll_status(request), RequestStatus::Disposed);
    assert_eq!(converter.tracked_jobs(), 0);
    Ok(())
}

#[test]
#[serial]
fn test_concurrent_pipeline_requests() -> Result<(), Box<dyn Error>> {
    let pool = Arc::new(FramePool::new(8));
    let converter = Arc::new(CpuConverter::new(4));
    let manager = ConversionManager::new(pool.clone(), converter.clone());

    let formats = [GREY, RGB3, RGBX, RGBA];
    let mut requests = Vec::new();
    for (n, format) in formats.iter().cycle().take(8).enumerate() {
        let frame = pool.insert(Frame::test_pattern(1280, 720, YUYV)?);
        let params = ConversionParams {
            input_rect: full_rect(1280, 720),
            output_width: 320 + n as u32,
            output_height: 240,
            output_format: *format,
            transform: Transform::None,
        };
        requests.push((manager.submit(frame, params)?, params));
    }

    for (request, params) in &requests {
        assert_eq!(wait_terminal(&manager, *request), RequestStatus::Ready);
        let view = manager.result_view(*request)?;
        assert_eq!(Some(view.len()), params.output_size());
        manager.dispose(*request);
    }

    assert_eq!(manager.live_requests(), 0);
    assert_eq!(converter.tracked_jobs(), 0);
    Ok(())
}

/// This test verifies that result buffers are released on disposal. If
/// buffers leaked, 100 1080p RGBA results would hold ~800MB.
#[test]
#[serial]
fn test_pipeline_cleanup() -> Result<(), Box<dyn Error>> {
    let pool = Arc::new(FramePool::new(2));
    let converter = Arc::new(CpuConverter::new(2));
    let manager = ConversionManager::new(pool.clone(), converter.clone());

    for _ in 0..100 {
        let frame = pool.insert(Frame::test_pattern(1920, 1080, YUYV)?);
        let request = manager.submit(
            frame,
            ConversionParams {
                input_rect: full_rect(1920, 1080),
                output_width: 1920,
                output_height: 1080,
                output_format: RGBA,
                transform: Transform::None,
            },
        )?;
        assert_eq!(wait_terminal(&manager, request), RequestStatus::Ready);
        assert_eq!(manager.result_view(request)?.len(), 8294400);
        manager.dispose(request);
    }

    assert_eq!(manager.live_requests(), 0);
    assert_eq!(converter.tracked_jobs(), 0);
    Ok(())
}

#[test]
#[serial]
fn test_dispose_pending_pipeline_request() -> Result<(), Box<dyn Error>> {
    let pool = Arc::new(FramePool::new(2));
    let converter = Arc::new(CpuConverter::new(1));
    let manager = ConversionManager::new(pool.clone(), converter.clone());

    // queue enough work that later submissions are still pending when
    // disposed
    let mut requests = Vec::new();
    for _ in 0..8 {
        let frame = pool.insert(Frame::test_pattern(1920, 1080, YUYV)?);
        let params = ConversionParams {
            input_rect: full_rect(1920, 1080),
            output_width: 1920,
            output_height: 1080,
            output_format: RGBA,
            transform: Transform::None,
        };
        requests.push(manager.submit(frame, params)?);
    }

    for request in &requests {
        manager.dispose(*request);
        assert_eq!(manager.poll_status(*request), RequestStatus::Disposed);
    }

    // give the worker time to drain the cancelled backlog
    let deadline = Instant::now() + Duration::from_secs(10);
    while converter.tracked_jobs() > 0 {
        assert!(Instant::now() < deadline, "cancelled jobs were not drained");
        thread::sleep(Duration::from_millis(1));
    }

    for request in &requests {
        assert_eq!(manager.poll_status(*request), RequestStatus::Disposed);
    }
    assert_eq!(manager.live_requests(), 0);
    Ok(())
}
