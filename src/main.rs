use arcam_convert::{
    convert::CpuConverter,
    image::{ConversionParams, Frame, FramePool, Rect},
    request::{ConversionManager, RequestHandle, RequestStatus},
};
use args::Args;
use clap::Parser;
use std::{
    error::Error,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod args;

fn update_fps(prev: &mut Instant, history: &mut Vec<i64>, index: &mut usize) -> i64 {
    let now = Instant::now();

    let elapsed = now.duration_since(*prev);
    *prev = Instant::now();

    history[*index] = 1e9 as i64 / elapsed.as_nanos().max(1) as i64;
    *index = (*index + 1) % history.len();

    (history.iter().sum::<i64>() as f64 / history.len() as f64).round() as i64
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Arcam Conversion Pipeline");

    let (cam_w, cam_h) = (args.camera_size[0], args.camera_size[1]);
    let camera_format = args.camera_format.into();
    let params = ConversionParams {
        input_rect: Rect {
            x: 0,
            y: 0,
            width: cam_w as i32,
            height: cam_h as i32,
        },
        output_width: args.stream_size[0],
        output_height: args.stream_size[1],
        output_format: args.stream_format.into(),
        transform: args.mirror.into(),
    };

    let pool = Arc::new(FramePool::new(args.pool_size));
    let manager = ConversionManager::new(pool.clone(), Arc::new(CpuConverter::new(args.workers)));

    let mut interval =
        tokio::time::interval(Duration::from_secs_f64(1.0 / args.fps.max(1) as f64));
    let mut in_flight: Vec<(RequestHandle, Instant)> = Vec::new();
    let mut submitted = 0u64;
    let mut prev = Instant::now();
    let mut history = vec![0; 30];
    let mut index = 0;

    loop {
        interval.tick().await;
        let fps = update_fps(&mut prev, &mut history, &mut index);

        if args.frames == 0 || submitted < args.frames {
            let now = Instant::now();
            let frame = pool.insert(Frame::test_pattern(cam_w, cam_h, camera_format)?);
            let capture_time = now.elapsed();
            let request = manager.submit(frame, params)?;
            in_flight.push((request, Instant::now()));
            submitted += 1;

            if args.verbose {
                println!("camera capture: {:?} fps: {}", capture_time, fps);
            }
        }

        in_flight.retain(|&(request, since)| match manager.poll_status(request) {
            RequestStatus::Pending => true,
            RequestStatus::Ready => {
                match manager.result_view(request) {
                    Ok(view) => {
                        if args.verbose {
                            println!(
                                "camera {}x{} image {}x{} size: {}KB convert: {:?}",
                                cam_w,
                                cam_h,
                                view.width(),
                                view.height(),
                                view.len() / 1024,
                                since.elapsed(),
                            );
                        }
                    }
                    Err(e) => eprintln!("{e:?}"),
                }
                manager.dispose(request);
                false
            }
            RequestStatus::Failed => {
                eprintln!("conversion failed after {:?}", since.elapsed());
                manager.dispose(request);
                false
            }
            RequestStatus::Disposed => false,
        });

        if args.frames != 0 && submitted >= args.frames && in_flight.is_empty() {
            break;
        }
    }

    info!(submitted, "pipeline finished");
    Ok(())
}
