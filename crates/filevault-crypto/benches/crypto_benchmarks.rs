//! Benchmarks for filevault-crypto

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filevault_crypto::{
    decrypt_bytes, encrypt,
    keys::{EncryptionKey, KeySize},
};

fn bench_symmetric(c: &mut Criterion) {
    let mut group = c.benchmark_group("symmetric");

    for (label, size) in [("aes-128-gcm", KeySize::Aes128), ("aes-256-gcm", KeySize::Aes256)] {
        let key = EncryptionKey::generate_with_size(size).unwrap();

        for len in [1024, 64 * 1024, 1024 * 1024].iter() {
            let data = vec![0u8; *len];
            group.throughput(Throughput::Bytes(*len as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("{}-encrypt", label), len),
                &data,
                |b, data| b.iter(|| encrypt(data, &key).unwrap()),
            );

            let sealed = encrypt(&data, &key).unwrap().to_bytes();
            group.bench_with_input(
                BenchmarkId::new(format!("{}-decrypt", label), len),
                &sealed,
                |b, sealed| b.iter(|| decrypt_bytes(sealed, &key).unwrap()),
            );
        }
    }

    group.finish();
}

fn bench_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("keys");
    let key = EncryptionKey::generate().unwrap();
    let exported = key.export();

    group.bench_function("generate", |b| b.iter(|| EncryptionKey::generate().unwrap()));
    group.bench_function("import", |b| b.iter(|| EncryptionKey::import(&exported).unwrap()));

    group.finish();
}

criterion_group!(benches, bench_symmetric, bench_keys);
criterion_main!(benches);
