mod config;
mod cpu;
mod cuda;
mod engine;
mod gpu;
mod grid;
mod life;
mod metrics;
mod simulation;
mod tiling;

use config::Config;
use engine::Backend;
use grid::{Grid, GridError};
use metrics::{MetricsConfig, MetricsTracker};
use simulation::Simulation;
use std::env;
use std::io::{self, Write};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

/// Clear screen, cursor home
const CLEAR_CONSOLE: &str = "\x1b[2J\x1b[1;1H";

/// Run settings (internal, maps from Config)
#[derive(Debug, Clone, PartialEq)]
struct Args {
    backend: Backend,
    width: usize,
    height: usize,
    input_file: Option<String>,
    input_living_mark: char,
    living_cells: usize,
    seed: u64,
    max_steps: u64,
    step_delay_ms: u64,
    max_block_edge: usize,
    render: bool,
    living_mark: char,
    dead_mark: char,
    clear_console: bool,
    metrics_enabled: bool,
    metrics_interval: u64,
    metrics_output_file: Option<String>,
}

impl From<Config> for Args {
    fn from(c: Config) -> Self {
        Self {
            // validate() has already rejected unknown names
            backend: c.backend.parse().unwrap_or(Backend::Auto),
            width: c.grid.width,
            height: c.grid.height,
            input_file: non_empty(c.grid.input_file),
            input_living_mark: c.grid.living_mark,
            living_cells: c.grid.living_cells,
            seed: c.grid.seed,
            max_steps: c.simulation.max_steps,
            step_delay_ms: c.simulation.step_delay_ms,
            max_block_edge: c.simulation.max_block_edge,
            render: c.render.enabled,
            living_mark: c.render.living_mark,
            dead_mark: c.render.dead_mark,
            clear_console: c.render.clear_console,
            metrics_enabled: c.metrics.enabled,
            metrics_interval: c.metrics.interval.max(1),
            metrics_output_file: non_empty(c.metrics.output_file),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// What the command line asks for
#[derive(Debug, PartialEq)]
enum Command {
    Run(Args),
    GenerateConfig(String),
    ListBackends,
    Help,
}

fn flag_value<'a>(argv: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    argv.get(*i)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn parse_flag<T: FromStr>(argv: &[String], i: &mut usize, flag: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let raw = flag_value(argv, i, flag)?;
    raw.parse()
        .map_err(|e| format!("Invalid value '{}' for {}: {}", raw, flag, e))
}

fn parse_mark(argv: &[String], i: &mut usize, flag: &str) -> Result<char, String> {
    let raw = flag_value(argv, i, flag)?;
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("{} expects a single character, got '{}'", flag, raw)),
    }
}

/// Parse the argument list (`argv[0]` is the program name).
///
/// The first pass loads `--config` (or short-circuits on
/// `--generate-config`), the second applies command-line overrides on top.
fn parse_args(argv: &[String]) -> Result<Command, String> {
    let mut config = Config::default();

    // First pass: check for --config or --generate-config
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--config" | "-c" => {
                let path = flag_value(argv, &mut i, "--config")?;
                config = Config::from_yaml(path)
                    .map_err(|e| format!("Error loading config file '{}': {}", path, e))?;
                log::info!("Loaded config from: {}", path);
            }
            "--generate-config" => {
                let output_path = match argv.get(i + 1) {
                    Some(p) if !p.starts_with('-') => p.clone(),
                    _ => "config.yaml".to_string(),
                };
                return Ok(Command::GenerateConfig(output_path));
            }
            "--help" => return Ok(Command::Help),
            "--list-backends" => return Ok(Command::ListBackends),
            _ => {}
        }
        i += 1;
    }

    // Second pass: CLI args override config file values
    i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--config" | "-c" => {
                i += 1; // skip, already processed
            }
            "--backend" | "-b" => {
                config.backend = flag_value(argv, &mut i, "--backend")?.to_string();
            }
            "--width" | "-w" => {
                config.grid.width = parse_flag(argv, &mut i, "--width")?;
            }
            "--height" | "-h" => {
                config.grid.height = parse_flag(argv, &mut i, "--height")?;
            }
            "--input" | "-i" => {
                config.grid.input_file = flag_value(argv, &mut i, "--input")?.to_string();
            }
            "--input-mark" => {
                config.grid.living_mark = parse_mark(argv, &mut i, "--input-mark")?;
            }
            "--living" | "-l" => {
                config.grid.living_cells = parse_flag(argv, &mut i, "--living")?;
            }
            "--seed" | "-s" => {
                config.grid.seed = parse_flag(argv, &mut i, "--seed")?;
            }
            "--steps" | "-n" => {
                config.simulation.max_steps = parse_flag(argv, &mut i, "--steps")?;
            }
            "--delay" | "-d" => {
                config.simulation.step_delay_ms = parse_flag(argv, &mut i, "--delay")?;
            }
            "--block-edge" => {
                config.simulation.max_block_edge = parse_flag(argv, &mut i, "--block-edge")?;
            }
            "--living-mark" => {
                config.render.living_mark = parse_mark(argv, &mut i, "--living-mark")?;
            }
            "--dead-mark" => {
                config.render.dead_mark = parse_mark(argv, &mut i, "--dead-mark")?;
            }
            "--no-clear" => {
                config.render.clear_console = false;
            }
            "--no-render" => {
                config.render.enabled = false;
            }
            "--metrics" => {
                config.metrics.enabled = true;
            }
            "--metrics-interval" => {
                config.metrics.interval = parse_flag(argv, &mut i, "--metrics-interval")?;
            }
            "--metrics-file" => {
                config.metrics.enabled = true;
                config.metrics.output_file = flag_value(argv, &mut i, "--metrics-file")?.to_string();
            }
            other => {
                return Err(format!("Unknown argument: {}", other));
            }
        }
        i += 1;
    }

    let warnings = config
        .validate()
        .map_err(|e| format!("Config validation error: {}", e))?;
    for warning in warnings {
        log::warn!("Config warning: {}", warning);
    }

    Ok(Command::Run(Args::from(config)))
}

fn print_help() {
    println!("Toroidal Game of Life on CUDA / wgpu / CPU");
    println!();
    println!("USAGE:");
    println!("    gpu-life [OPTIONS]");
    println!("    gpu-life --config config.yaml");
    println!("    gpu-life --generate-config [output.yaml]");
    println!();
    println!("CONFIG FILE:");
    println!("    -c, --config <FILE>       Load settings from YAML config file");
    println!("    --generate-config [FILE]  Generate template config (default: config.yaml)");
    println!();
    println!("OPTIONS (override config file values):");
    println!("    -b, --backend <NAME>      auto, cuda, wgpu or cpu (default: auto)");
    println!("    --list-backends           Show which backends can run here");
    println!("    --block-edge <N>          Largest tile edge, 1-32 (default: 32)");
    println!();
    println!("GRID:");
    println!("    -w, --width <N>           Grid width (default: 64)");
    println!("    -h, --height <N>          Grid height (default: 32)");
    println!("    -l, --living <N>          Living cells in a random grid (default: 512)");
    println!("    -s, --seed <N>            Random seed (default: 42)");
    println!("    -i, --input <FILE>        Load the grid from a text file instead");
    println!("    --input-mark <C>          Living-cell character in the file (default: #)");
    println!();
    println!("RUN:");
    println!("    -n, --steps <N>           Stop after N steps (0 = run until interrupted)");
    println!("    -d, --delay <MS>          Pause between steps (default: 100)");
    println!("    --living-mark <C>         Character drawn for living cells (default: #)");
    println!("    --dead-mark <C>           Character drawn for dead cells (default: .)");
    println!("    --no-clear                Do not clear the console between frames");
    println!("    --no-render               Do not print the grid");
    println!();
    println!("METRICS:");
    println!("    --metrics                 Track population, births and deaths");
    println!("    --metrics-interval <N>    Sample every N steps (default: 1)");
    println!("    --metrics-file <FILE>     Also write samples as CSV");
    println!();
    println!("    --help                    Print this help message");
    println!();
    println!("Set RUST_LOG=debug for per-step timings.");
}

fn list_backends() {
    println!("Available backends:");
    println!("  cuda: {}", availability(cuda::cuda_available()));
    println!("  wgpu: {}", availability(gpu::wgpu_available()));
    println!("  cpu:  yes ({} threads)", rayon::current_num_threads());
}

fn availability(available: bool) -> &'static str {
    if available {
        "yes"
    } else {
        "no"
    }
}

fn build_grid(args: &Args) -> Result<Grid, GridError> {
    match args.input_file {
        Some(ref path) => {
            let grid = Grid::read_from_file(path, args.input_living_mark)?;
            log::info!("Loaded {}x{} grid from {}", grid.width(), grid.height(), path);
            Ok(grid)
        }
        None => Grid::random(args.width, args.height, args.living_cells, args.seed),
    }
}

fn draw_frame(sim: &Simulation, args: &Args) -> io::Result<()> {
    let grid = sim.current_grid();
    let mut frame = String::new();
    if args.clear_console {
        frame.push_str(CLEAR_CONSOLE);
    }
    frame.push_str(&grid.render(args.living_mark, args.dead_mark));
    frame.push_str(&format!(
        "step {} | population {} | {}\n",
        sim.step_count(),
        grid.population(),
        sim.engine_name()
    ));

    let mut out = io::stdout().lock();
    out.write_all(frame.as_bytes())?;
    out.flush()
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let initial = build_grid(args)?;
    let cells = initial.len();

    println!("Game of Life");
    println!("============\n");
    println!("Configuration:");
    match args.input_file {
        Some(ref path) => println!("  Source: {}", path),
        None => println!("  Source: random, {} living (seed {})", args.living_cells, args.seed),
    }
    if args.max_steps > 0 {
        println!("  Steps: {}", args.max_steps);
    } else {
        println!("  Steps: unlimited");
    }
    println!("  Delay: {} ms", args.step_delay_ms);

    let mut sim = Simulation::with_backend(initial, args.backend, args.max_block_edge)?;
    println!("  Grid: {}x{} ({} cells)", sim.width(), sim.height(), cells);
    println!("  Backend: {}\n", sim.engine_name());
    let mut tracker = MetricsTracker::new(MetricsConfig {
        enabled: args.metrics_enabled,
        interval: args.metrics_interval,
        output_path: args.metrics_output_file.clone(),
    })?;

    let delay = Duration::from_millis(args.step_delay_ms);
    let run_start = Instant::now();

    loop {
        if args.render {
            draw_frame(&sim, args)?;
        }
        if args.max_steps > 0 && sim.step_count() >= args.max_steps {
            break;
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let start = Instant::now();
        sim.advance()?;
        let micros = start.elapsed().as_micros() as u64;
        let step = sim.step_count();
        log::debug!("step {} took {} us (current: {:?})", step, micros, sim.current_slot());

        if tracker.should_collect(step) {
            tracker.collect(step, sim.previous_grid().cells(), sim.current_grid().cells(), micros);
        }
    }

    tracker.flush()?;

    println!(
        "\nCompleted {} steps in {:.2}s on {}",
        sim.step_count(),
        run_start.elapsed().as_secs_f64(),
        sim.engine_name()
    );
    tracker.print_summary();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = env::args().collect();
    let args = match parse_args(&argv) {
        Ok(Command::Run(args)) => args,
        Ok(Command::GenerateConfig(path)) => match Config::write_template(&path) {
            Ok(()) => {
                println!("Generated config template: {}", path);
                return;
            }
            Err(e) => {
                eprintln!("Error writing config template: {}", e);
                std::process::exit(1);
            }
        },
        Ok(Command::ListBackends) => {
            list_backends();
            return;
        }
        Ok(Command::Help) => {
            print_help();
            return;
        }
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Run with --help for usage.");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("gpu-life")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    fn run_args(args: &[&str]) -> Args {
        match parse_args(&argv(args)) {
            Ok(Command::Run(args)) => args,
            other => panic!("expected run command, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let args = run_args(&[]);
        assert_eq!(args, Args::from(Config::default()));
        assert_eq!(args.backend, Backend::Auto);
        assert_eq!(args.input_file, None);
        assert_eq!(args.metrics_output_file, None);
    }

    #[test]
    fn test_overrides() {
        let args = run_args(&[
            "-b", "cpu", "-w", "20", "-h", "10", "-l", "30", "-s", "7", "-n", "5", "-d", "0",
            "--living-mark", "@", "--dead-mark", " ", "--no-clear", "--no-render",
        ]);
        assert_eq!(args.backend, Backend::Cpu);
        assert_eq!((args.width, args.height), (20, 10));
        assert_eq!(args.living_cells, 30);
        assert_eq!(args.seed, 7);
        assert_eq!(args.max_steps, 5);
        assert_eq!(args.step_delay_ms, 0);
        assert_eq!((args.living_mark, args.dead_mark), ('@', ' '));
        assert!(!args.clear_console);
        assert!(!args.render);
    }

    #[test]
    fn test_metrics_file_enables_metrics() {
        let args = run_args(&["--metrics-file", "out.csv"]);
        assert!(args.metrics_enabled);
        assert_eq!(args.metrics_output_file.as_deref(), Some("out.csv"));
    }

    #[test]
    fn test_special_commands() {
        assert_eq!(parse_args(&argv(&["--help"])), Ok(Command::Help));
        assert_eq!(parse_args(&argv(&["--list-backends"])), Ok(Command::ListBackends));
        assert_eq!(
            parse_args(&argv(&["--generate-config"])),
            Ok(Command::GenerateConfig("config.yaml".to_string()))
        );
        assert_eq!(
            parse_args(&argv(&["--generate-config", "life.yaml"])),
            Ok(Command::GenerateConfig("life.yaml".to_string()))
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_args(&argv(&["--bogus"])).is_err());
        assert!(parse_args(&argv(&["--width"])).is_err());
        assert!(parse_args(&argv(&["--width", "wide"])).is_err());
        assert!(parse_args(&argv(&["--backend", "opencl"])).is_err());
        assert!(parse_args(&argv(&["--living-mark", "ab"])).is_err());
        // validation runs after overrides
        assert!(parse_args(&argv(&["-w", "2", "-h", "2", "-l", "5"])).is_err());
        assert!(parse_args(&argv(&["--dead-mark", "#"])).is_err());
        assert!(parse_args(&argv(&["--block-edge", "33"])).is_err());
    }

    #[test]
    fn test_oversized_grid_is_rejected_not_panicking() {
        let result = parse_args(&argv(&["-w", "18446744073709551615", "-h", "2", "-l", "1"]));
        match result {
            Err(msg) => assert!(msg.contains("too large"), "{}", msg),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_file_then_cli_override() {
        let path = std::env::temp_dir().join("gpu_life_main_test.yaml");
        std::fs::write(
            &path,
            "backend: cpu\ngrid:\n  width: 12\n  height: 9\n  living_cells: 20\nsimulation:\n  max_steps: 3\n",
        )
        .unwrap();
        let path_str = path.to_string_lossy().to_string();

        // CLI wins regardless of position relative to --config
        let args = run_args(&["-w", "16", "--config", path_str.as_str()]);
        assert_eq!(args.backend, Backend::Cpu);
        assert_eq!((args.width, args.height), (16, 9));
        assert_eq!(args.living_cells, 20);
        assert_eq!(args.max_steps, 3);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_config_file() {
        assert!(parse_args(&argv(&["-c", "/nonexistent/gpu_life.yaml"])).is_err());
    }

    #[test]
    fn test_run_without_render() {
        let args = run_args(&["-b", "cpu", "-w", "10", "-h", "10", "-l", "25", "-n", "4", "-d", "0", "--no-render"]);
        assert!(run(&args).is_ok());
    }

    #[test]
    fn test_build_grid_from_file() {
        let path = std::env::temp_dir().join("gpu_life_main_grid.txt");
        std::fs::write(&path, ".O.\n..O\nOOO\n").unwrap();
        let path_str = path.to_string_lossy().to_string();
        let args = run_args(&["-i", path_str.as_str(), "--input-mark", "O"]);
        let grid = build_grid(&args).unwrap();
        assert_eq!((grid.width(), grid.height()), (3, 3));
        assert_eq!(grid.population(), 5);
        let _ = std::fs::remove_file(&path);
    }
}
