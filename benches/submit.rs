use arcam_convert::convert::{Converter, NativeBuffer, NativeRequestId, NativeStatus};
use arcam_convert::error::ConvertError;
use arcam_convert::image::{ConversionParams, Frame, FramePool, Rect, Transform, GREY};
use arcam_convert::request::{ConversionManager, RequestStatus};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Backend that completes instantly, so the measurement is the manager's
/// tracking overhead rather than pixel work.
struct InstantConverter {
    buffer: NativeBuffer,
    next: AtomicU64,
}

impl InstantConverter {
    fn new(len: usize) -> Self {
        Self {
            buffer: NativeBuffer::new(vec![0u8; len]),
            next: AtomicU64::new(1),
        }
    }
}

impl Converter for InstantConverter {
    fn submit(
        &self,
        _frame: Arc<Frame>,
        _params: ConversionParams,
    ) -> Result<NativeRequestId, ConvertError> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn status(&self, _id: NativeRequestId) -> NativeStatus {
        NativeStatus::Ready
    }

    fn resolve(&self, _id: NativeRequestId) -> Result<NativeBuffer, ConvertError> {
        Ok(self.buffer.clone())
    }

    fn release(&self, _id: NativeRequestId) {}
}

pub fn benchmark_submit(c: &mut Criterion) {
    let pool = Arc::new(FramePool::new(4));
    let manager = ConversionManager::new(pool.clone(), Arc::new(InstantConverter::new(76800)));
    let frame = pool.insert(Frame::test_pattern(640, 480, GREY).unwrap());
    let params = ConversionParams {
        input_rect: Rect {
            x: 0,
            y: 0,
            width: 640,
            height: 480,
        },
        output_width: 320,
        output_height: 240,
        output_format: GREY,
        transform: Transform::None,
    };

    c.bench_function("request/lifecycle", |b| {
        b.iter(|| {
            let request = manager.submit(frame, params).unwrap();
            assert_eq!(manager.poll_status(request), RequestStatus::Ready);
            let view = manager.result_view(request).unwrap();
            assert_eq!(view.len(), 76800);
            manager.dispose(request);
        })
    });
}

criterion_group!(benches, benchmark_submit);
criterion_main!(benches);
