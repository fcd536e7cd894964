//! Array conversion benchmarks
//!
//! Measures the per-element cost of concrete and variant array conversion
//! against the simulated runtime.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use olebridge::{Converter, Guid, RawVariant, SimulatedPlatform, VarType};

fn bench_concrete_arrays(c: &mut Criterion) {
    let mut group = c.benchmark_group("concrete");

    for size in [16, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("i32", size), size, |b, &size| {
            let converter = Converter::new(SimulatedPlatform::new());
            let values: Vec<i32> = (0..size as i32).collect();
            let array = converter
                .platform()
                .array_from_values(VarType::I4, 0, &values)
                .expect("array");
            b.iter(|| black_box(converter.array_to_concrete(black_box(array)).expect("convert")));
        });
    }

    group.finish();
}

fn bench_variant_arrays(c: &mut Criterion) {
    let mut group = c.benchmark_group("variant");

    for size in [16, 256, 1024].iter() {
        group.bench_with_input(BenchmarkId::new("mixed", size), size, |b, &size| {
            let converter = Converter::new(SimulatedPlatform::new());
            let platform = converter.platform();
            let variants = (0..size)
                .map(|i| match i % 3 {
                    0 => RawVariant::from_i32(i as i32),
                    1 => RawVariant::from_f64(i as f64),
                    _ => RawVariant::from_bstr(platform.string("element")),
                })
                .collect();
            let array = platform.array_from_variants(0, variants).expect("array");
            b.iter(|| black_box(converter.array_to_variants(black_box(array)).expect("convert")));
        });
    }

    group.finish();
}

fn bench_identifier_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("identifier");
    let text = "{00020400-0000-0000-C000-000000000046}";

    group.bench_function("from_str", |b| {
        b.iter(|| black_box(black_box(text).parse::<Guid>()))
    });

    group.bench_function("to_foreign", |b| {
        let id: Guid = text.parse().expect("identifier");
        b.iter(|| black_box(black_box(id).to_foreign()))
    });

    group.finish();
}

criterion_group!(benches, bench_concrete_arrays, bench_variant_arrays, bench_identifier_parsing);
criterion_main!(benches);
