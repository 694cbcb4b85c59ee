// SPDX-License-Identifier: Apache-2.0

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use keel::{SmallVector, Vector};

fn push_back(c: &mut Criterion) {
	let mut group = c.benchmark_group("push_back");

	group.bench_function("heap vector", |b| b.iter_batched(
		Vector::<u64>::new,
		|mut vector| {
			for value in 0..1024u64 {
				vector.push_back(value).unwrap();
			}
			vector
		},
		BatchSize::PerIteration
	));

	group.bench_function("inline vector", |b| b.iter_batched(
		SmallVector::<u64, 1024>::new,
		|mut vector| {
			for value in 0..1024u64 {
				vector.push_back(value).unwrap();
			}
			vector
		},
		BatchSize::PerIteration
	));
	group.finish();
}

fn insert_front(c: &mut Criterion) {
	c.bench_function("insert_front", |b| b.iter_batched(
		|| Vector::<u64>::with_capacity(1024).unwrap(),
		|mut vector| {
			for value in 0..256u64 {
				vector.push_front(value).unwrap();
			}
			vector
		},
		BatchSize::PerIteration
	));
}

fn shrink_to_fit(c: &mut Criterion) {
	c.bench_function("shrink_to_fit", |b| b.iter_batched(
		|| {
			let mut vector = SmallVector::<u64, 16>::new();
			for value in 0..1024u64 {
				vector.push_back(value).unwrap();
			}
			vector.truncate(8);
			vector
		},
		|mut vector| {
			vector.shrink_to_fit().unwrap();
			vector
		},
		BatchSize::PerIteration
	));
}

criterion_group!(benches, push_back, insert_front, shrink_to_fit);
criterion_main!(benches);
