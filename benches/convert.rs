use arcam_convert::convert::convert_frame;
use arcam_convert::image::{ConversionParams, Frame, Rect, Transform, GREY, RGB3, RGBA, YUYV};
use criterion::{criterion_group, criterion_main, Criterion};

pub fn benchmark_convert(c: &mut Criterion) {
    let fmts = [RGBA, RGB3, YUYV, GREY];
    let dims = [(320, 240), (640, 480), (960, 540), (1920, 1080)];

    for src_fmt in fmts.iter() {
        let mut group = c.benchmark_group(format!("convert/{}", src_fmt));
        for src_dim in dims.iter() {
            for dst_dim in dims.iter().filter(|d| d.0 <= src_dim.0 && d.1 <= src_dim.1) {
                let frame = Frame::test_pattern(src_dim.0, src_dim.1, *src_fmt).unwrap();
                let params = ConversionParams {
                    input_rect: Rect {
                        x: 0,
                        y: 0,
                        width: src_dim.0 as i32,
                        height: src_dim.1 as i32,
                    },
                    output_width: dst_dim.0,
                    output_height: dst_dim.1,
                    output_format: RGBA,
                    transform: Transform::None,
                };
                group.bench_with_input(
                    format!("{}x{}-{}x{}", src_dim.0, src_dim.1, dst_dim.0, dst_dim.1),
                    &(frame, params),
                    |b, (frame, params)| b.iter(|| convert_frame(frame, params)),
                );
            }
        }
    }
}

criterion_group!(benches, benchmark_convert);
criterion_main!(benches);
