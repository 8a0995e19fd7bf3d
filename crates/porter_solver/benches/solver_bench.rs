use criterion::{criterion_group, criterion_main, Criterion};
use porter_matrix::great_circle::GreatCircleOracle;
use porter_solver::json::{decode_problem, VrpInput};
use porter_solver::{SearchParams, Solver};

/// Ring of jobs around a single depot, everything reachable.
fn instance(jobs: usize) -> String {
    let mut job_entries = Vec::with_capacity(jobs);
    for i in 0..jobs {
        let angle = (i as f64) / (jobs as f64) * std::f64::consts::TAU;
        let lon = 2.35 + 0.05 * angle.cos();
        let lat = 48.85 + 0.05 * angle.sin();
        job_entries.push(format!(
            r#"{{"id": {}, "location": [{lon}, {lat}], "delivery": [1]}}"#,
            i + 1
        ));
    }

    format!(
        r#"{{
            "jobs": [{}],
            "vehicles": [
                {{"id": 1, "start": [2.35, 48.85], "end": [2.35, 48.85], "capacity": [{}]}},
                {{"id": 2, "start": [2.35, 48.85], "end": [2.35, 48.85], "capacity": [{}]}}
            ]
        }}"#,
        job_entries.join(","),
        jobs / 2 + 1,
        jobs / 2 + 1,
    )
}

fn bench_solve(c: &mut Criterion) {
    let raw = instance(40);
    let params = SearchParams {
        rounds: 4,
        streams: 4,
        ..SearchParams::default()
    };

    c.bench_function("solve_ring_40", |b| {
        b.iter(|| {
            let input: VrpInput = serde_json::from_str(&raw).unwrap();
            let problem = decode_problem(input, &GreatCircleOracle::default()).unwrap();
            let solver = Solver::new(problem, params.clone());
            solver.solve().unwrap()
        })
    });
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
