use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pktkit_core::LayerType;
use pktkit_filter::Filter;

const TEST_ETH_IPV4_TCP: &[u8] = &[
    0x00, 0x21, 0x96, 0x6e, 0xf0, 0x70, 0x4c, 0x72, 0xb9, 0x54, 0xe5, 0x3d, 0x08, 0x00, 0x45,
    0x00, 0x00, 0x28, 0x00, 0x01, 0x00, 0x00, 0x40, 0x06, 0x27, 0x5f, 0xc0, 0xa8, 0x01, 0x87,
    0xc1, 0x1b, 0xd0, 0x25, 0xa2, 0x5a, 0x20, 0x92, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x50, 0x02, 0x20, 0x00, 0x79, 0x85, 0x00, 0x00,
];

fn bench_matches(c: &mut Criterion) {
    let port = Filter::compile("port 8338", LayerType::Eth).unwrap();
    c.bench_function("match port 8338", |b| {
        b.iter(|| port.matches(black_box(TEST_ETH_IPV4_TCP)))
    });

    let compound = Filter::compile("(udp or tcp) and port 8338", LayerType::Eth).unwrap();
    c.bench_function("match compound", |b| {
        b.iter(|| compound.matches(black_box(TEST_ETH_IPV4_TCP)))
    });
}

criterion_group!(benches, bench_matches);
criterion_main!(benches);
