use argus_collections::{ListChange, ObservableList};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_change_aggregation(c: &mut Criterion) {
    c.bench_function("list_extend_1k", |b| {
        b.iter(|| {
            let list: ObservableList<i32> = ObservableList::new();
            list.add_change_listener(ListChange::listener(|change: &ListChange<i32>| {
                black_box(change);
            }));
            list.extend(0..1000);
            black_box(list.len())
        })
    });

    c.bench_function("list_clear_1k", |b| {
        b.iter(|| {
            let list = ObservableList::from((0..1000).collect::<Vec<i32>>());
            list.add_change_listener(ListChange::listener(|change: &ListChange<i32>| {
                black_box(change);
            }));
            list.clear();
            black_box(list.len())
        })
    });

    c.bench_function("list_sort_1k", |b| {
        b.iter(|| {
            let list = ObservableList::from((0..1000).rev().collect::<Vec<i32>>());
            list.add_change_listener(ListChange::listener(|change: &ListChange<i32>| {
                black_box(change);
            }));
            list.sort();
            black_box(list.len())
        })
    });
}

criterion_group!(benches, bench_change_aggregation);
criterion_main!(benches);
