//! 스캐너 벤치마크
//!
//! 쿨다운 게이트 판정, RGB → 휘도 변환, 프레임 디코드 성능을 측정합니다.

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use scanpost_core::event::DetectionEvent;
use scanpost_scanner::detection::decode_first;
use scanpost_scanner::{Frame, RqrrDecoder, ScanGate};
use tokio::time::Instant;

const RESOLUTIONS: [(u32, u32); 3] = [(320, 240), (640, 480), (1280, 720)];

/// 가로 줄무늬 휘도 프레임 (코드 없음)
fn striped_frame(width: u32, height: u32) -> Frame {
    let luma: Vec<u8> = (0..height)
        .flat_map(|y| {
            let shade = if (y / 8) % 2 == 0 { 32 } else { 224 };
            std::iter::repeat_n(shade, width as usize)
        })
        .collect();
    Frame::from_luma(width, height, luma)
}

fn bench_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate");
    let event = DetectionEvent::new("ABC123");

    group.bench_function("accept_burst", |b| {
        b.iter(|| {
            let mut gate = ScanGate::new(Duration::from_millis(2000));
            let t0 = Instant::now();
            for i in 0..100_u64 {
                black_box(gate.accept_at(&event, t0 + Duration::from_millis(i * 50)));
            }
        });
    });

    group.finish();
}

fn bench_frame_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_from_rgb");

    for (width, height) in RESOLUTIONS {
        let rgb = vec![128_u8; (width * height * 3) as usize];
        group.throughput(Throughput::Bytes(rgb.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &rgb,
            |b, rgb| b.iter(|| Frame::from_rgb(width, height, black_box(rgb))),
        );
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_no_code");
    let decoder = RqrrDecoder::new();

    for (width, height) in RESOLUTIONS {
        let frame = striped_frame(width, height);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &frame,
            |b, frame| b.iter(|| decode_first(&decoder, black_box(frame))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_gate, bench_frame_conversion, bench_decode);
criterion_main!(benches);
