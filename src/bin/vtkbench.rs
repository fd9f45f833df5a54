use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use vtk_pipeline::filters::{BinnedDecimation, ContourFilter, ImageSource, SphereSource, StaticPointLocator};
use vtk_pipeline::scene::{Actor, Mapper, Renderer};
use vtk_pipeline::{DataObject, Result};

#[derive(Parser, Debug)]
#[command(name = "vtkbench", version, about = "Time the heavier pipeline stages")]
struct Cli {
    /// Problem size: points per axis, sphere resolution or number of actors.
    #[arg(long, global = true, default_value_t = 32)]
    size: usize,

    /// Timed iterations.
    #[arg(long = "loop", global = true, default_value_t = 10)]
    loops: usize,

    /// Leading iterations left out of the timing.
    #[arg(long, global = true, default_value_t = 1)]
    skip: usize,

    /// Worker threads for the parallel stages (all cores when omitted).
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a static locator over size^3 random points and query it.
    Locator,
    /// Contour a sphere distance field sampled on size^3 points.
    Contour,
    /// Bin a finely tessellated sphere into a coarse grid.
    Decimate,
    /// Render a ring of `size` sphere actors while orbiting the camera.
    Ring,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("vtkbench: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let size = cli.size.max(2);
    let mut stage: Box<dyn FnMut() -> Result<usize>> = match cli.cmd {
        Command::Locator => locator(size, cli.threads)?,
        Command::Contour => contour(size)?,
        Command::Decimate => decimate(size, cli.threads)?,
        Command::Ring => ring(size)?,
    };

    let mut timed = Duration::ZERO;
    let mut output = 0;
    for i in 0..cli.skip + cli.loops {
        let start = Instant::now();
        output = stage()?;
        let elapsed = start.elapsed();
        if i >= cli.skip {
            timed += elapsed;
        }
        tracing::debug!(iteration = i, elapsed = ?elapsed, "iteration done");
    }

    let per_loop = timed / cli.loops.max(1) as u32;
    println!(
        "{:?} size={} loops={} skipped={} total={:?} per-loop={:?} output={}",
        cli.cmd, size, cli.loops, cli.skip, timed, per_loop, output
    );
    Ok(())
}

fn locator(size: usize, threads: Option<usize>) -> Result<Box<dyn FnMut() -> Result<usize>>> {
    let mut rng = StdRng::seed_from_u64(7);
    let points: Vec<[f64; 3]> = (0..size * size * size).map(|_| rng.gen()).collect();
    let queries: Vec<[f64; 3]> = (0..size * size).map(|_| rng.gen()).collect();
    Ok(Box::new(move || {
        let locator = StaticPointLocator::build(points.clone(), 4, threads)?;
        tracing::debug!(threads = locator.number_of_threads_used(), "locator built");
        Ok(queries.iter().filter_map(|p| locator.find_closest_point(*p)).count())
    }))
}

fn contour(size: usize) -> Result<Box<dyn FnMut() -> Result<usize>>> {
    let source = ImageSource::sphere([size; 3]);
    let last = size as i32 - 1;
    let image = DataObject::from(source.generate(&[0, last, 0, last, 0, last])?);
    let filter = ContourFilter::with_values(&[0.25, 0.5, 0.75]);
    Ok(Box::new(move || Ok(filter.contour(&image)?.number_of_cells())))
}

fn decimate(size: usize, threads: Option<usize>) -> Result<Box<dyn FnMut() -> Result<usize>>> {
    let mut sphere = SphereSource::new([0.0; 3], 1.0);
    sphere.set_theta_resolution(size * 4);
    sphere.set_phi_resolution(size * 4);
    let surface = sphere.generate()?;
    let mut filter = BinnedDecimation::new();
    filter.set_number_of_divisions([size; 3]);
    filter.set_number_of_threads(threads);
    Ok(Box::new(move || Ok(filter.decimate(&surface)?.number_of_cells())))
}

fn ring(size: usize) -> Result<Box<dyn FnMut() -> Result<usize>>> {
    let mut renderer = Renderer::new();
    renderer.set_size(640, 480);
    let sphere = SphereSource::new([0.0; 3], 0.4).generate()?;
    for i in 0..size {
        let angle = std::f64::consts::TAU * i as f64 / size as f64;
        let mut actor = Actor::with_mapper(Mapper::with_input(sphere.clone()));
        actor.set_position([angle.cos() * size as f64 * 0.25, angle.sin() * size as f64 * 0.25, 0.0]);
        renderer.add_actor(actor);
    }
    renderer.reset_camera();
    Ok(Box::new(move || {
        renderer.camera_mut().azimuth(1.0);
        renderer.render();
        Ok(renderer.frames_rendered())
    }))
}
