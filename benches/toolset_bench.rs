use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ckb_mcp::config::PresetName;
use ckb_mcp::mcp::catalog::Catalog;
use ckb_mcp::mcp::pagination::{decode_cursor, paginate};
use ckb_mcp::mcp::presets::{filter_and_order, toolset_fingerprint};

fn bench_filter(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let mut group = c.benchmark_group("toolset.filter");
    for preset in [PresetName::Core, PresetName::Review, PresetName::Full] {
        group.bench_function(preset.as_str(), |b| {
            b.iter(|| filter_and_order(black_box(catalog.tools()), preset))
        });
    }
    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let tools = filter_and_order(Catalog::builtin().tools(), PresetName::Full);
    c.bench_function("toolset.fingerprint/full", |b| {
        b.iter(|| toolset_fingerprint(black_box(&tools)))
    });
}

fn bench_page_walk(c: &mut Criterion) {
    let tools = filter_and_order(Catalog::builtin().tools(), PresetName::Full);
    let fp = toolset_fingerprint(&tools);
    c.bench_function("toolset.page_walk/full", |b| {
        b.iter(|| {
            let mut cursor = String::new();
            let mut seen = 0usize;
            loop {
                let offset = decode_cursor(&cursor, PresetName::Full, &fp).unwrap_or(0);
                let page = paginate(&tools, offset as i64, 15, PresetName::Full, &fp);
                seen += page.items.len();
                match page.next_cursor {
                    Some(next) => cursor = next,
                    None => break,
                }
            }
            black_box(seen)
        })
    });
}

criterion_group!(benches, bench_filter, bench_fingerprint, bench_page_walk);
criterion_main!(benches);
