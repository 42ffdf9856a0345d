use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use room_slots::breakpoints::MediaQueryHub;
use room_slots::logging::{LogEvent, LogSink};
use room_slots::size::merge_size_maps;
use room_slots::tokens::NoTokens;
use room_slots::{
    Breakpoint, Logger, LoggingResult, PartialSize, SlotConfig, SlotContext, SlotDefinition,
    SlotHost, SlotInstance, SlotRegistry, SlotRuntime, SlotSizeMap, base_registry,
};

#[derive(Clone, Default)]
struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _event: &LogEvent) -> LoggingResult<()> {
        Ok(())
    }
}

fn caller_registry() -> SlotRegistry {
    (0..32u32).fold(SlotRegistry::new(), |registry, index| {
        let sizes = SlotSizeMap::new()
            .with(Breakpoint::Sm, PartialSize::new().inline(format!("{index}rem")))
            .with(Breakpoint::Lg, PartialSize::new().block(index * 10));
        let definition = SlotDefinition::new(sizes).extending("catalog.card");
        registry.with(format!("bench.slot{index}"), definition)
    })
}

fn registry_merge(c: &mut Criterion) {
    let base = base_registry();
    let overrides = caller_registry();
    c.bench_function("registry_merge", |b| {
        b.iter(|| SlotRegistry::merge(black_box(&base), black_box(&overrides)));
    });
}

fn size_map_merge(c: &mut Criterion) {
    let registry = base_registry();
    let base = registry
        .get("catalog.card")
        .map(|d| d.sizes.clone())
        .unwrap_or_default();
    let overrides = SlotSizeMap::new()
        .with(Breakpoint::Md, PartialSize::new().inline("token:card-width"))
        .with(Breakpoint::Xl, PartialSize::new().block(512u32));
    c.bench_function("size_map_merge", |b| {
        b.iter(|| merge_size_maps(black_box(&base), black_box(&overrides), &NoTokens));
    });
}

fn nested_resolution(c: &mut Criterion) {
    let mut config = SlotConfig {
        diagnostics: true,
        logger: Some(Logger::new(NullSink)),
        ..SlotConfig::default()
    };
    config.enable_metrics();
    let host = SlotHost {
        media: MediaQueryHub::with_viewport_width(1100.0),
        ..SlotHost::default()
    };
    let runtime = SlotRuntime::new(&caller_registry(), host, config);
    let outer = SlotInstance::new("dashboard.panel");
    let inner = SlotInstance::new("bench.slot7").inherit();
    let leaf = SlotInstance::new("list.row");

    c.bench_function("nested_resolution", |b| {
        b.iter(|| {
            let mut ctx = SlotContext::new();
            runtime.mount(&outer, &mut ctx, None, |_, ctx| {
                runtime.mount(&inner, ctx, None, |_, ctx| {
                    black_box(runtime.resolve(&leaf, ctx))
                })
            })
        });
    });
}

criterion_group!(benches, registry_merge, size_map_merge, nested_resolution);
criterion_main!(benches);
