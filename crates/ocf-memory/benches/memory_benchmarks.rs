//! Hot path benchmarks for guest memory access

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ocf_memory::{Memory, MemoryKind};

fn bench_typed_access(c: &mut Criterion) {
    let mem = Memory::initialise().unwrap();
    let addr = mem.alloc(MemoryKind::Application, 0x1_0000);

    c.bench_function("write_u32", |b| {
        b.iter(|| {
            mem.write::<u32>(black_box(addr), black_box(0x1234_5678));
        })
    });

    c.bench_function("read_u32", |b| {
        mem.write::<u32>(addr, 0x1234_5678);
        b.iter(|| black_box(mem.read::<u32>(black_box(addr))))
    });

    c.bench_function("read_u64_no_swap", |b| {
        b.iter(|| black_box(mem.read_no_swap::<u64>(black_box(addr))))
    });
}

fn bench_alloc_free(c: &mut Criterion) {
    let mem = Memory::initialise().unwrap();

    c.bench_function("alloc_free_page", |b| {
        b.iter(|| {
            let addr = mem.alloc(MemoryKind::MEM1, 0x1_0000);
            mem.free(black_box(addr));
        })
    });
}

criterion_group!(benches, bench_typed_access, bench_alloc_free);
criterion_main!(benches);
