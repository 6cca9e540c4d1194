use std::hint::black_box;

use chrono::TimeZone;
use chrono_tz::Tz;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use justcal_core::{resolve_range, translate, DateParser, NaturalDateParser, RangePolicy};

const PATTERNS: &[(&str, &str)] = &[
    ("keyword", "weekdays"),
    ("weekly_two_days", "weekly on Sundays and Tuesdays"),
    ("monthly_nth", "monthly on the last Friday"),
    ("monthly_day", "monthly on the 22nd"),
    ("every", "every 3 weeks"),
    ("passthrough", "FREQ=MONTHLY;BYDAY=MO;BYSETPOS=2"),
    ("unrecognized", "every Tuesday maybe"),
];

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");
    for (name, pattern) in PATTERNS {
        group.bench_with_input(BenchmarkId::from_parameter(name), pattern, |b, p| {
            b.iter(|| translate(black_box(Some(*p))))
        });
    }
    group.finish();
}

fn bench_dates(c: &mut Criterion) {
    let tz: Tz = "America/New_York".parse().unwrap();
    let now = tz.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    let parser = NaturalDateParser::with_now(now);

    c.bench_function("parse_tomorrow_at_3pm", |b| {
        b.iter(|| parser.parse(black_box("tomorrow at 3pm")))
    });
    c.bench_function("resolve_list_default", |b| {
        let policy = RangePolicy::default();
        b.iter(|| resolve_range(None, None, black_box(now), &policy))
    });
}

criterion_group!(benches, bench_translate, bench_dates);
criterion_main!(benches);
