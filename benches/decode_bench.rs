use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::io::Cursor;

use swathio::format::{GswCodec, SwathCodec};
use swathio::record::{BeamFlag, Ping, Record};

fn survey_ping(beams: usize) -> Ping {
    Ping {
        time_d: 1_089_804_645.0,
        longitude: -121.9,
        latitude: 36.8,
        speed: 9.5,
        heading: 271.0,
        sensor_depth: 2.0,
        altitude: 80.0,
        sensor_id: 710,
        flags: vec![BeamFlag::Ok; beams],
        bath: (0..beams).map(|i| 1000.0 + i as f64 * 0.25).collect(),
        across: (0..beams).map(|i| (i as f64 - beams as f64 / 2.0) * 5.0).collect(),
        along: vec![0.5; beams],
        amp: vec![20.0; beams],
        travel_time: vec![1.33; beams],
        angle: (0..beams).map(|i| (i as f64 - beams as f64 / 2.0) * 0.14).collect(),
        ..Ping::default()
    }
}

fn bench_ping_codec(c: &mut Criterion) {
    let mut codec = GswCodec::big_endian();
    let ping = survey_ping(256);
    let record = Record::Data(ping);

    let mut encoded = Vec::new();
    codec.encode(&mut encoded, &record).unwrap();

    c.bench_function("encode_ping_256_beams", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(encoded.len());
            codec.encode(&mut out, black_box(&record)).unwrap();
            out
        })
    });

    c.bench_function("decode_ping_256_beams", |b| {
        b.iter(|| {
            let mut cur = Cursor::new(black_box(&encoded[..]));
            codec.decode_next(&mut cur).unwrap()
        })
    });
}

criterion_group!(benches, bench_ping_codec);
criterion_main!(benches);
