use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use pbc::*;

// KPI-aligned benchmark scenarios.
// Every scenario is a valid snapshot: a chain of nodes where each node
// consumes the previous node's named output, plus one pipeline parameter.

fn chain_snapshot(len: usize) -> String {
    let mut nodes = Vec::with_capacity(len);
    for i in 0..len {
        let args = if i == 0 {
            r#"[{"id":"a","name":"lr","mode":"pipeline","key":"lr"}]"#.to_string()
        } else {
            format!(
                r#"[{{"id":"a","name":"data","mode":"node","nodeId":"n{}","outputName":"data"}},{{"id":"b","name":"k","value":"{}","type":"int"}}]"#,
                i - 1,
                i
            )
        };
        nodes.push(format!(
            r#"{{"id":"n{i}","label":"Step {i}","componentType":"python","args":{args},"outputs":[{{"id":"o","name":"data","type":"Output[Dataset]"}}],"code":"def f():\n    pass"}}"#,
        ));
    }
    // listed newest-first so sequencing has to reorder
    nodes.reverse();
    let edges: Vec<String> = (1..len)
        .map(|i| format!(r#"{{"source":"n{}","target":"n{}"}}"#, i - 1, i))
        .collect();
    format!(
        r#"{{"pipelineName":"bench","pipelineParams":[{{"key":"lr","type":"float","value":"0.1"}}],"nodes":[{}],"edges":[{}]}}"#,
        nodes.join(","),
        edges.join(",")
    )
}

fn scenarios() -> Vec<(&'static str, String)> {
    vec![
        ("small", chain_snapshot(3)),
        ("medium", chain_snapshot(25)),
        ("large", chain_snapshot(200)),
    ]
}

fn loaded(json: &str) -> snapshot::GraphSnapshot {
    let mut snap = snapshot::from_json(json)
        .expect("benchmark scenario must parse")
        .snapshot;
    snap.sync_types();
    snap
}

// KPI: full compile latency (parse -> normalize -> sync -> validate -> sequence -> codegen).
fn bench_kpi_full_compile_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/full_compile_latency");
    let opts = codegen::CodegenOptions::default();

    for (name, json) in scenarios() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &json, |b, json| {
            b.iter(|| {
                let raw = snapshot::parse_raw(black_box(json)).expect("scenario must parse");
                let mut state = pipeline::CompilationState::new(raw);
                pipeline::run_pipeline(&mut state, pass::PassId::Codegen, &opts, |_, _| {})
                    .expect("scenario must compile");
                black_box(state.generated);
            });
        });
    }

    group.finish();
}

// KPI: phase-level latency on a non-trivial snapshot.
fn bench_kpi_phase_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/phase_latency");
    let json = chain_snapshot(50);
    let snap = loaded(&json);
    let opts = codegen::CodegenOptions::default();

    group.bench_function("normalize", |b| {
        b.iter(|| black_box(snapshot::from_json(black_box(&json))));
    });
    group.bench_function("sync", |b| {
        b.iter_batched(
            || snapshot::from_json(&json).expect("scenario must parse").snapshot,
            |mut s| black_box(s.sync_types()),
            BatchSize::SmallInput,
        );
    });
    group.bench_function("validate", |b| {
        b.iter(|| black_box(validate::validate(&snap.nodes, &snap.edges, &snap.pipeline_params)));
    });
    group.bench_function("sequence", |b| {
        b.iter(|| black_box(sequence::sequence(&snap.nodes, &snap.edges).ids()));
    });
    group.bench_function("codegen", |b| {
        b.iter(|| {
            black_box(codegen::compile(
                &snap.nodes,
                &snap.edges,
                &snap.pipeline_params,
                &snap.pipeline_name,
                &opts,
            ))
        });
    });

    group.finish();
}

// KPI: sequencing scaling with graph size.
fn bench_kpi_sequence_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/sequence_scaling");

    for len in [10usize, 100, 1000] {
        let snap = loaded(&chain_snapshot(len));
        group.bench_with_input(BenchmarkId::from_parameter(len), &snap, |b, snap| {
            b.iter(|| black_box(sequence::sequence(&snap.nodes, &snap.edges).is_sorted()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_kpi_full_compile_latency,
    bench_kpi_phase_latency,
    bench_kpi_sequence_scaling,
);
criterion_main!(benches);
