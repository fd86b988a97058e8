use std::path::PathBuf;

use clap::Parser;
use glam::DVec3;

use planet_simulator::biomes;
use planet_simulator::climate::{self, ClimateParameters, SingularClimateError};
use planet_simulator::errors::ClimateError;
use planet_simulator::export;
use planet_simulator::grid::Grid;
use planet_simulator::planet::{heightmap_to_planet, Planet};
use planet_simulator::terrain::{self, AlgorithmRegistry, TerrainParameters};

#[derive(Parser, Debug)]
#[command(name = "planet_simulator")]
#[command(about = "Generate a spherical planet with terrain, rivers and seasonal climate")]
struct Args {
    /// Grid subdivision level (tile count is 10 * 4^level + 2)
    #[arg(short, long, default_value = "4")]
    level: u32,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Terrain algorithm name from the registry
    #[arg(short, long, default_value = "default")]
    algorithm: String,

    /// Number of displacement octaves
    #[arg(long, default_value = "6")]
    octaves: u32,

    /// Displacement amplitude in meters
    #[arg(long, default_value = "3000.0")]
    magnitude: f64,

    /// Amplitude decay per octave (0-1]
    #[arg(long, default_value = "0.65")]
    persistence: f64,

    /// Planet radius in kilometers
    #[arg(long, default_value = "6371.0")]
    radius: f64,

    /// Sea level target elevation in meters
    #[arg(long, default_value = "0.0")]
    sea_level: f64,

    /// Axial tilt in degrees
    #[arg(long, default_value = "23.4")]
    axial_tilt: f64,

    /// Seasons per annual cycle
    #[arg(long, default_value = "4")]
    seasons: u32,

    /// Climate convergence tolerance
    #[arg(long, default_value = "0.05")]
    acceptable_delta: f64,

    /// Precipitation scale factor
    #[arg(long, default_value = "1.0")]
    precipitation_factor: f64,

    /// Humidity half-life in days
    #[arg(long, default_value = "30.0")]
    humidity_half_life: f64,

    /// Write the per-season dump to this path (Python module)
    #[arg(short, long)]
    export: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let seed = args.seed.unwrap_or_else(rand::random);
    println!("Generating planet with seed: {}", seed);

    println!("Building grid sequence to level {}...", args.level);
    let grids = Grid::build_sequence(args.level);
    let finest = grids.last().unwrap().clone();
    println!("Grid has {} tiles, {} corners", finest.tile_count(), finest.corner_count());

    println!("Generating terrain ({})...", args.algorithm);
    let registry = AlgorithmRegistry::load("terrain")?;
    let params = TerrainParameters {
        algorithm: args.algorithm.clone(),
        octaves: args.octaves,
        magnitude: args.magnitude,
        persistence: args.persistence,
        seed,
    };
    let elevation = terrain::generate_elevation(&registry, &grids, &params)?;

    let axis = DVec3::Z;
    let planet = heightmap_to_planet(finest, elevation, args.radius, axis)?
        .with_sea_level(args.sea_level);
    report_elevation(&planet);

    println!("Routing rivers...");
    let planet = planet.with_rivers();
    let max_discharge = (0..planet.tile_count() as u32)
        .map(|t| planet.discharge(t))
        .fold(0.0, f64::max);
    println!("Largest river discharge: {:.0} tiles of drainage", max_discharge);

    println!("Simulating climate ({} seasons per cycle)...", args.seasons);
    let climate_params = ClimateParameters {
        axial_tilt: args.axial_tilt.to_radians(),
        acceptable_delta: args.acceptable_delta,
        precipitation_factor: args.precipitation_factor,
        humidity_half_life_days: args.humidity_half_life,
        seasons_per_cycle: args.seasons,
    };
    let cycle = match climate::singular_climate(&planet, &climate_params) {
        Ok(cycle) => cycle,
        Err(SingularClimateError::Climate(ClimateError::NonConvergence {
            cycles,
            max_delta,
            partial,
        })) => {
            // The best-so-far cycle is still usable; report and carry on.
            println!(
                "Climate did not converge after {} cycles (max delta {:.4}); using best-so-far state",
                cycles, max_delta
            );
            *partial
        }
        Err(e) => return Err(e.into()),
    };
    let planet = planet.with_climate_cycle(cycle);
    report_climate(&planet);

    finish(planet, args)
}

fn finish(planet: Planet, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    println!("Classifying biomes...");
    let biomes = biomes::classify(&planet);
    let stats = biomes::statistics(&biomes);
    print_statistics(&stats);

    if let Some(path) = &args.export {
        println!("Exporting planet dump to {}...", path.display());
        export::export_planet(&planet, path)?;
    }
    println!("Done");
    Ok(())
}

fn report_elevation(planet: &Planet) {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut land = 0usize;
    for t in 0..planet.tile_count() as u32 {
        let e = planet.elevation(t);
        min = min.min(e);
        max = max.max(e);
        if planet.is_land(t) {
            land += 1;
        }
    }
    println!(
        "Elevation range: {:.0}m to {:.0}m ({:.1}% land)",
        min,
        max,
        100.0 * land as f64 / planet.tile_count() as f64
    );
}

fn report_climate(planet: &Planet) {
    let cycle = planet.climate().expect("climate was just simulated");
    let mut min_temp = f64::MAX;
    let mut max_temp = f64::MIN;
    for state in cycle.seasons() {
        for &t in &state.temperature {
            min_temp = min_temp.min(t);
            max_temp = max_temp.max(t);
        }
    }
    println!(
        "Temperature range: {:.1}C to {:.1}C across {} seasons",
        min_temp - 273.15,
        max_temp - 273.15,
        cycle.seasons_per_cycle()
    );
}

fn print_statistics(stats: &biomes::BiomeStats) {
    let pct = |n: usize, of: usize| {
        if of == 0 { 0.0 } else { 100.0 * n as f64 / of as f64 }
    };
    println!("Ocean: {:.2}%", pct(stats.ocean, stats.total));
    println!("Land: {:.2}%", pct(stats.land, stats.total));
    println!("    Forest: {:.2}%", pct(stats.forest, stats.land));
    println!("    Savanna: {:.2}%", pct(stats.savanna, stats.land));
    println!("    Grass: {:.2}%", pct(stats.grass, stats.land));
    println!("    Desert: {:.2}%", pct(stats.desert, stats.land));
    println!("    Wetlands: {:.2}%", pct(stats.wetland, stats.land));
    println!("    Mountain: {:.2}%", pct(stats.mountain, stats.land));
}
