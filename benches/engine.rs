//! Benchmarks for the CPU reference stepper and the GPU engine.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use reaction_diffusion::{
    compute::gpu::{DeviceContext, EngineError, ProgramDescription, Simulation},
    compute::{CpuPropagator, GrayScottParams, PixelBuffer},
    schema::{Seed, SimulationConfig},
};

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_gray_scott_step");

    for size in [64, 128, 256, 512] {
        let initial = Seed::default()
            .generate(size, size)
            .expect("seed fits the grid");
        let params = GrayScottParams::default();
        let mut propagator = CpuPropagator::new(initial, move |f: &PixelBuffer, x, y| {
            params.transition(f, x, y)
        });

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    propagator.step(black_box(1));
                });
            },
        );
    }

    group.finish();
}

fn bench_gpu_step(c: &mut Criterion) {
    let ctx = match pollster::block_on(DeviceContext::headless()) {
        Ok(ctx) => ctx,
        Err(EngineError::NoAdapter) => {
            eprintln!("No GPU adapter available, skipping GPU benchmarks");
            return;
        }
        Err(e) => panic!("GPU init failed: {e}"),
    };

    let mut group = c.benchmark_group("gpu_gray_scott_frame");

    for size in [256u32, 512, 1024] {
        let config = SimulationConfig {
            width: size,
            height: size,
            ..Default::default()
        };
        let mut sim = Simulation::new(
            ctx.clone(),
            &config,
            &ProgramDescription::gray_scott(),
            &ProgramDescription::present(),
        )
        .expect("engine construction");
        let initial = Seed::default()
            .generate(size as usize, size as usize)
            .expect("seed fits the grid");
        sim.seed_all(&initial).expect("seed upload");

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    sim.step(black_box(config.iterations_per_frame)).unwrap();
                    sim.context()
                        .device
                        .poll(wgpu::PollType::wait_indefinitely())
                        .ok();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_cpu_step, bench_gpu_step);
criterion_main!(benches);
