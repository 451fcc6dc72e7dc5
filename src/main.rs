//! Reaction-Diffusion CLI - Run a headless simulation from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use reaction_diffusion::{
    animation::{FrameFormat, FrameRecorder, RecorderConfig},
    compute::gpu::{DeviceContext, EngineError, ProgramDescription, Simulation},
    compute::{ChannelStats, PixelBuffer},
    driver::{FixedRateDriver, Tick},
    schema::{Seed, SimulationConfig},
};

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Recording failed: {0}")]
    Io(#[from] io::Error),
}

/// One displayed frame per tick, with optional recording and progress output.
struct Run {
    sim: Simulation,
    recorder: Option<FrameRecorder>,
    frames: u64,
    completed: u64,
    start: Instant,
}

impl Tick for Run {
    type Error = RunError;

    fn tick(&mut self) -> Result<(), RunError> {
        self.sim.tick()?;
        self.completed += 1;

        if let Some(recorder) = &mut self.recorder {
            let frame = self
                .sim
                .readback_surface(0, 0, self.sim.width(), self.sim.height())?;
            recorder.record_bytes(&frame)?;
        }

        // Print progress every 10%
        if self.completed % (self.frames / 10).max(1) == 0 {
            let field = read_field(&self.sim)?;
            let b = field.channel_stats(1);
            let elapsed = self.start.elapsed().as_secs_f32();
            println!(
                "  Frame {}/{}: generation={}, mean B={:.6}, {:.1} frames/s",
                self.completed,
                self.frames,
                self.sim.generation(),
                b.mean,
                self.completed as f32 / elapsed
            );
        }
        Ok(())
    }
}

fn read_field(sim: &Simulation) -> Result<PixelBuffer, EngineError> {
    sim.readback_field(0, 0, sim.width(), sim.height())
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [frames] [--record out.rdfa]", args[0]);
        eprintln!();
        eprintln!("Run a Gray-Scott reaction-diffusion simulation on the GPU.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  frames       Number of displayed frames (default: from config)");
        eprintln!("  --record     Write every presented frame to an .rdfa archive");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let mut frames_arg = None;
    let mut record_path = None;
    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        if arg == "--record" {
            let Some(path) = rest.next() else {
                eprintln!("--record needs an output path");
                std::process::exit(1);
            };
            record_path = Some(PathBuf::from(path));
        } else {
            frames_arg = Some(arg.parse::<u64>().unwrap_or_else(|e| {
                eprintln!("Invalid frame count `{}`: {}", arg, e);
                std::process::exit(1);
            }));
        }
    }

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });
    let frames = frames_arg.unwrap_or(config.frames);

    // Load or create seed
    let seed_path = config_path.with_extension("seed.json");
    let seed: Seed = if seed_path.exists() {
        let seed_str = fs::read_to_string(&seed_path).unwrap_or_else(|e| {
            eprintln!("Error reading seed file: {}", e);
            std::process::exit(1);
        });
        serde_json::from_str(&seed_str).unwrap_or_else(|e| {
            eprintln!("Error parsing seed: {}", e);
            std::process::exit(1);
        })
    } else {
        Seed::default()
    };

    println!("Reaction-Diffusion Simulation");
    println!("=============================");
    println!("Grid: {}x{}", config.width, config.height);
    println!("Iterations per frame: {}", config.iterations_per_frame);
    println!("Frame rate: {} (0 = unthrottled)", config.frame_rate);
    println!("Frames: {}", frames);
    println!();

    let initial = seed
        .generate(config.width as usize, config.height as usize)
        .unwrap_or_else(|e| {
            eprintln!("Error generating seed: {}", e);
            std::process::exit(1);
        });
    print_stats("Initial state", &initial);

    let ctx = pollster::block_on(DeviceContext::headless()).unwrap_or_else(|e| {
        eprintln!("Error creating GPU device: {}", e);
        std::process::exit(1);
    });
    println!("Adapter: {} ({:?})", ctx.adapter_info.name, ctx.adapter_info.backend);

    let mut sim = Simulation::new(
        ctx,
        &config,
        &ProgramDescription::gray_scott(),
        &ProgramDescription::present(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Error creating simulation: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = sim.seed_all(&initial) {
        eprintln!("Error seeding field: {}", e);
        std::process::exit(1);
    }

    let recorder = record_path.as_ref().map(|path| {
        let rec_config = RecorderConfig {
            format: FrameFormat::for_surface(config.surface_format),
            ..Default::default()
        };
        FrameRecorder::new(path, &config, rec_config).unwrap_or_else(|e| {
            eprintln!("Error creating {}: {}", path.display(), e);
            std::process::exit(1);
        })
    });

    println!("Running simulation...");
    let mut run = Run {
        sim,
        recorder,
        frames,
        completed: 0,
        start: Instant::now(),
    };
    let driver = FixedRateDriver::new(config.frame_rate).with_max_ticks(frames);
    if let Err(e) = driver.run(&mut run) {
        eprintln!("Simulation failed after {} frames: {}", run.completed, e);
        std::process::exit(1);
    }
    let elapsed = run.start.elapsed();

    println!();
    match read_field(&run.sim) {
        Ok(field) => print_stats("Final state", &field),
        Err(e) => {
            eprintln!("Error reading back field: {}", e);
            std::process::exit(1);
        }
    }
    println!("Generation: {}", run.sim.generation());
    println!(
        "Time: {:.2}s ({:.1} frames/s)",
        elapsed.as_secs_f32(),
        frames as f32 / elapsed.as_secs_f32()
    );

    if let (Some(recorder), Some(path)) = (run.recorder, record_path) {
        match recorder.finalize() {
            Ok(stats) => println!("Recorded {}: {}", path.display(), stats),
            Err(e) => {
                eprintln!("Error finalizing {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }
}

fn print_stats(title: &str, field: &PixelBuffer) {
    let line = |name: &str, s: ChannelStats| {
        println!(
            "  {}: mean={:.6}, range=[{:.6}, {:.6}]",
            name, s.mean, s.min, s.max
        );
    };
    println!("{}:", title);
    line("A", field.channel_stats(0));
    line("B", field.channel_stats(1));
    println!();
}

fn print_example_config() {
    let config = SimulationConfig::default();
    let seed = Seed::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
    println!();
    println!("Example seed (config.seed.json):");
    match serde_json::to_string_pretty(&seed) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing seed: {}", e),
    }
}
