//! Seasonal climate simulation
//!
//! A fixed-point iteration over discrete seasons: each season derives
//! insolation from the orbital phase, relaxes temperature toward its
//! radiative equilibrium, diffuses and decays humidity, condenses
//! precipitation, and updates snow cover and leaf area. Whole annual cycles
//! repeat until two consecutive cycles agree on every field, every tile,
//! every season to within `acceptable_delta`.
//!
//! Units follow the conventions of the exporter downstream: temperature in
//! kelvin, elevation in meters, precipitation as an average rate in m/s (a
//! wet tile sits around 3e-8, one meter per year), snow as water-equivalent
//! depth in meters, humidity as precipitable water in meters.

use std::f64::consts::PI;

use rayon::prelude::*;

use crate::errors::{ClimateError, ConfigError};
use crate::planet::Planet;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Hard cap on fixed-point cycles; exceeding it reports non-convergence
/// instead of looping forever on degenerate parameters.
pub const MAX_CYCLES: u32 = 100;

/// Days per full seasonal cycle.
const DAYS_PER_CYCLE: f64 = 365.25;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Freezing point (K); also the neutral starting temperature.
pub const FREEZING: f64 = 273.15;

/// Radiative equilibrium endpoints: no sun, and overhead equatorial sun (K).
const TEMP_DARK: f64 = 220.0;
const TEMP_SUN_RANGE: f64 = 110.0;

/// Temperature drop per meter of elevation (6.5 K/km lapse rate).
const LAPSE_RATE: f64 = 0.0065;

/// Ocean seasonal inertia: fraction of the gap to equilibrium closed per
/// season. Land takes the equilibrium directly.
const OCEAN_RESPONSE: f64 = 0.3;

/// Ocean evaporation ceiling per season (m of precipitable water).
const EVAPORATION_MAX: f64 = 0.45;

/// Fraction of last season's rainfall a land tile re-evaporates.
const LAND_RECYCLING: f64 = 0.5;

/// Evapotranspiration per unit of leaf area (m per season).
const LAI_EVAPORATION: f64 = 0.002;

/// Precipitable water capacity at the reference temperature (m).
const SATURATION_REFERENCE: f64 = 0.3;
const SATURATION_TEMP: f64 = 288.0;
const SATURATION_SCALE: f64 = 12.0;

/// Convective rainout fraction of humidity per season at full warmth.
const CONVECTIVE_RATE: f64 = 0.1;

/// Orographic enhancement: extra rainout scaled by relief over the lowest
/// neighbor, saturating at `OROGRAPHIC_RELIEF` meters.
const OROGRAPHIC_RELIEF: f64 = 2000.0;
const OROGRAPHIC_RATE: f64 = 0.05;

/// Snow accumulation cap (m water equivalent) so polar tiles converge.
const SNOW_CAP: f64 = 10.0;

/// Snow melt per kelvin-day above freezing (m water equivalent).
const MELT_RATE: f64 = 0.01;

/// Maximum leaf-area-index under ideal growth conditions.
const LAI_MAX: f64 = 10.0;

/// Fraction of the gap to the growth target closed per season; below 1 so
/// vegetation carries history across seasons instead of resetting.
const LAI_RESPONSE: f64 = 0.35;

// =============================================================================
// PARAMETERS AND STATE
// =============================================================================

/// Fixed configuration for one climate simulation run.
#[derive(Clone, Debug)]
pub struct ClimateParameters {
    /// Axial tilt in radians.
    pub axial_tilt: f64,
    /// Convergence tolerance for the cycle fixed point.
    pub acceptable_delta: f64,
    /// Scale factor applied to condensed precipitation.
    pub precipitation_factor: f64,
    /// Humidity half-life in days; sets the per-season decay factor.
    pub humidity_half_life_days: f64,
    /// Discrete seasons per annual cycle.
    pub seasons_per_cycle: u32,
}

impl ClimateParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seasons_per_cycle == 0 {
            return Err(ConfigError::invalid("seasons_per_cycle", "must be at least 1"));
        }
        if self.acceptable_delta <= 0.0 {
            return Err(ConfigError::invalid(
                "acceptable_delta",
                format!("must be positive, got {}", self.acceptable_delta),
            ));
        }
        if self.humidity_half_life_days <= 0.0 {
            return Err(ConfigError::invalid(
                "humidity_half_life_days",
                format!("must be positive, got {}", self.humidity_half_life_days),
            ));
        }
        if self.precipitation_factor <= 0.0 {
            return Err(ConfigError::invalid(
                "precipitation_factor",
                format!("must be positive, got {}", self.precipitation_factor),
            ));
        }
        if !(0.0..PI / 2.0).contains(&self.axial_tilt) {
            return Err(ConfigError::invalid(
                "axial_tilt",
                format!("must be in [0, pi/2) radians, got {}", self.axial_tilt),
            ));
        }
        Ok(())
    }

    fn season_days(&self) -> f64 {
        DAYS_PER_CYCLE / self.seasons_per_cycle as f64
    }

    fn season_seconds(&self) -> f64 {
        self.season_days() * SECONDS_PER_DAY
    }

    /// Geometric humidity decay per season from the half-life.
    fn humidity_decay(&self) -> f64 {
        0.5f64.powf(self.season_days() / self.humidity_half_life_days)
    }
}

impl Default for ClimateParameters {
    fn default() -> Self {
        Self {
            axial_tilt: 23.4f64.to_radians(),
            acceptable_delta: 0.05,
            precipitation_factor: 1.0,
            humidity_half_life_days: 30.0,
            seasons_per_cycle: 4,
        }
    }
}

/// Per-tile fields for one season.
#[derive(Clone, Debug, PartialEq)]
pub struct SeasonState {
    pub insolation: Vec<f64>,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
    pub precipitation: Vec<f64>,
    pub snow: Vec<f64>,
    pub lai: Vec<f64>,
}

impl SeasonState {
    /// Neutral starting state: freezing temperature, everything else zero.
    pub fn neutral(tile_count: usize) -> SeasonState {
        SeasonState {
            insolation: vec![0.0; tile_count],
            temperature: vec![FREEZING; tile_count],
            humidity: vec![0.0; tile_count],
            precipitation: vec![0.0; tile_count],
            snow: vec![0.0; tile_count],
            lai: vec![0.0; tile_count],
        }
    }

    /// Largest absolute per-tile difference across all fields.
    fn max_delta(&self, other: &SeasonState) -> f64 {
        let pairs = [
            (&self.insolation, &other.insolation),
            (&self.temperature, &other.temperature),
            (&self.humidity, &other.humidity),
            (&self.precipitation, &other.precipitation),
            (&self.snow, &other.snow),
            (&self.lai, &other.lai),
        ];
        pairs
            .iter()
            .flat_map(|(a, b)| a.iter().zip(b.iter()))
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }
}

/// A full annual cycle of season states, indexed by season number.
#[derive(Clone, Debug)]
pub struct ClimateCycle {
    seasons: Vec<SeasonState>,
}

impl ClimateCycle {
    pub fn seasons_per_cycle(&self) -> u32 {
        self.seasons.len() as u32
    }

    pub fn season(&self, season: u32) -> &SeasonState {
        assert!(
            (season as usize) < self.seasons.len(),
            "season index out of range: {}",
            season
        );
        &self.seasons[season as usize]
    }

    pub fn seasons(&self) -> &[SeasonState] {
        &self.seasons
    }
}

/// Progress snapshot passed to the cancellation hook after each cycle.
#[derive(Clone, Copy, Debug)]
pub struct CycleReport {
    pub cycle: u32,
    /// Max field delta against the previous cycle; infinite during the
    /// first cycle, when there is nothing to compare against.
    pub max_delta: f64,
}

// =============================================================================
// SEASON TRANSITION
// =============================================================================

/// Pure transition: derive one season's fields from the previous season's
/// finalized state. Per-tile work reads only the prior state and is
/// parallelized across tiles.
pub fn climate_next(
    planet: &Planet,
    params: &ClimateParameters,
    prev: &SeasonState,
    season: u32,
) -> SeasonState {
    let count = planet.tile_count();
    let theta =
        2.0 * PI * (season % params.seasons_per_cycle) as f64 / params.seasons_per_cycle as f64;
    let declination = params.axial_tilt * theta.sin();

    let insolation: Vec<f64> = (0..count as u32)
        .into_par_iter()
        .map(|t| day_averaged_flux(planet.latitude(t), declination))
        .collect();

    let temperature: Vec<f64> = (0..count as u32)
        .into_par_iter()
        .map(|t| {
            let equilibrium = TEMP_DARK + TEMP_SUN_RANGE * insolation[t as usize]
                - LAPSE_RATE * planet.elevation(t).max(0.0);
            if planet.is_land(t) {
                equilibrium
            } else {
                // Ocean thermal inertia damps the seasonal swing.
                let prior = prev.temperature[t as usize];
                prior + OCEAN_RESPONSE * (equilibrium - prior)
            }
        })
        .collect();

    let decay = params.humidity_decay();
    let season_seconds = params.season_seconds();

    let pooled: Vec<f64> = (0..count as u32)
        .into_par_iter()
        .map(|t| {
            // Local diffusion: mean over the tile and its neighbors.
            let neighbors = &planet.grid.tile(t).neighbors;
            let mut sum = prev.humidity[t as usize];
            for &n in neighbors {
                sum += prev.humidity[n as usize];
            }
            let mean = sum / (neighbors.len() + 1) as f64;

            let replenished = if planet.is_land(t) {
                LAND_RECYCLING * prev.precipitation[t as usize] * season_seconds
                    + LAI_EVAPORATION * prev.lai[t as usize]
            } else {
                let warmth = ((temperature[t as usize] - FREEZING + 2.0) / 30.0).clamp(0.0, 1.0);
                EVAPORATION_MAX * warmth
            };
            mean * decay + replenished
        })
        .collect();

    // Condensation: saturation excess plus convective and orographic
    // rainout, capped by the available humidity.
    let condensed: Vec<f64> = (0..count as u32)
        .into_par_iter()
        .map(|t| {
            let h = pooled[t as usize];
            let temp = temperature[t as usize];
            let excess = (h - saturation_capacity(temp)).max(0.0);
            let warmth = ((temp - FREEZING) / 30.0).clamp(0.0, 1.0);
            let uplift = orographic_uplift(planet, t);
            (excess + CONVECTIVE_RATE * h * warmth + OROGRAPHIC_RATE * h * uplift).min(h)
        })
        .collect();

    let precipitation: Vec<f64> = condensed
        .iter()
        .map(|c| params.precipitation_factor * c / season_seconds)
        .collect();

    let humidity: Vec<f64> = pooled
        .iter()
        .zip(&condensed)
        .map(|(h, c)| (h - c).max(0.0))
        .collect();

    let season_days = params.season_days();
    let snow: Vec<f64> = (0..count)
        .map(|t| {
            if !planet.is_land(t as u32) {
                return 0.0;
            }
            let temp = temperature[t];
            if temp <= FREEZING {
                (prev.snow[t] + precipitation[t] * season_seconds).min(SNOW_CAP)
            } else {
                (prev.snow[t] - MELT_RATE * (temp - FREEZING) * season_days).max(0.0)
            }
        })
        .collect();

    let lai: Vec<f64> = (0..count)
        .map(|t| {
            let target = if planet.is_land(t as u32) && snow[t] == 0.0 {
                let warmth = ((temperature[t] - FREEZING + 5.0) / 30.0).clamp(0.0, 1.0);
                let moisture = (precipitation[t] / 2.0e-8).clamp(0.0, 1.0);
                let sunlight = (insolation[t] / 0.5).clamp(0.0, 1.0);
                LAI_MAX * warmth * moisture * sunlight
            } else {
                0.0
            };
            prev.lai[t] + LAI_RESPONSE * (target - prev.lai[t])
        })
        .collect();

    SeasonState { insolation, temperature, humidity, precipitation, snow, lai }
}

/// Day/night-averaged solar flux at a latitude for a given solar
/// declination, normalized so an overhead equatorial sun gives 1.0. Zero
/// through polar night; polar summer exceeds 1 (the sun never sets).
fn day_averaged_flux(latitude: f64, declination: f64) -> f64 {
    let cos_lat = latitude.cos();
    let sin_lat = latitude.sin();
    let cos_h0 = if cos_lat < 1e-9 {
        // Exactly at a pole the sun is either always up or always down.
        if sin_lat * declination.sin() > 0.0 { -1.0 } else { 1.0 }
    } else {
        (-latitude.tan() * declination.tan()).clamp(-1.0, 1.0)
    };
    let h0 = cos_h0.acos();
    (h0 * sin_lat * declination.sin() + cos_lat * declination.cos() * h0.sin()).max(0.0)
}

/// Precipitable water capacity: roughly doubles every `SATURATION_SCALE`
/// kelvin (Clausius-Clapeyron shape).
fn saturation_capacity(temperature: f64) -> f64 {
    SATURATION_REFERENCE * ((temperature - SATURATION_TEMP) / SATURATION_SCALE).exp()
}

/// Relief above the lowest neighbor, saturating at `OROGRAPHIC_RELIEF`.
fn orographic_uplift(planet: &Planet, tile: u32) -> f64 {
    let own = planet.elevation(tile);
    let lowest = planet
        .grid
        .tile(tile)
        .neighbors
        .iter()
        .map(|&n| planet.elevation(n))
        .fold(f64::INFINITY, f64::min);
    ((own - lowest) / OROGRAPHIC_RELIEF).clamp(0.0, 1.0)
}

// =============================================================================
// FIXED-POINT DRIVER
// =============================================================================

/// Iterate whole annual cycles from a neutral state until two consecutive
/// cycles agree within `acceptable_delta`, returning the converged cycle.
pub fn singular_climate(
    planet: &Planet,
    params: &ClimateParameters,
) -> Result<ClimateCycle, SingularClimateError> {
    singular_climate_with_progress(planet, params, |_| true)
}

/// As `singular_climate`, with a cooperative cancellation hook invoked
/// between cycles; returning `false` aborts without corrupting the planet
/// built so far.
pub fn singular_climate_with_progress(
    planet: &Planet,
    params: &ClimateParameters,
    mut progress: impl FnMut(CycleReport) -> bool,
) -> Result<ClimateCycle, SingularClimateError> {
    params.validate()?;

    let spc = params.seasons_per_cycle;
    let mut prev_cycle: Option<Vec<SeasonState>> = None;
    let mut carry = SeasonState::neutral(planet.tile_count());
    let mut last_delta = f64::INFINITY;

    for cycle in 1..=MAX_CYCLES {
        let mut seasons = Vec::with_capacity(spc as usize);
        for season in 0..spc {
            carry = climate_next(&planet, params, &carry, season);
            seasons.push(carry.clone());
        }

        if let Some(prev) = &prev_cycle {
            last_delta = prev
                .iter()
                .zip(&seasons)
                .map(|(a, b)| a.max_delta(b))
                .fold(0.0, f64::max);
            log::debug!("climate cycle {}: max delta {:.6}", cycle, last_delta);
            if last_delta < params.acceptable_delta {
                log::info!("climate converged after {} cycles", cycle);
                return Ok(ClimateCycle { seasons });
            }
        }

        if !progress(CycleReport { cycle, max_delta: last_delta }) {
            return Err(ClimateError::Aborted { cycle }.into());
        }
        prev_cycle = Some(seasons);
    }

    Err(ClimateError::NonConvergence {
        cycles: MAX_CYCLES,
        max_delta: last_delta,
        partial: Box::new(ClimateCycle { seasons: prev_cycle.expect("at least one cycle ran") }),
    }
    .into())
}

/// Either kind of failure `singular_climate` can surface: bad parameters up
/// front, or a failed/aborted iteration.
#[derive(Debug, thiserror::Error)]
pub enum SingularClimateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Climate(#[from] ClimateError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::planet::heightmap_to_planet;
    use glam::DVec3;
    use std::sync::Arc;

    fn flat_planet(elevation: f64) -> Planet {
        let grid = Arc::new(Grid::build(0));
        heightmap_to_planet(grid, vec![elevation; 12], 6371.0, DVec3::Z).unwrap()
    }

    fn no_tilt_params(seasons_per_cycle: u32, acceptable_delta: f64) -> ClimateParameters {
        ClimateParameters {
            axial_tilt: 0.0,
            acceptable_delta,
            precipitation_factor: 1.0,
            humidity_half_life_days: 30.0,
            seasons_per_cycle,
        }
    }

    #[test]
    fn test_flux_is_zero_in_polar_night() {
        let tilt = 23.4f64.to_radians();
        // Deep in the winter hemisphere, past the polar circle.
        assert_eq!(day_averaged_flux(-86f64.to_radians(), tilt), 0.0);
        // Polar summer gets round-the-clock sun.
        assert!(day_averaged_flux(86f64.to_radians(), tilt) > 1.0);
    }

    #[test]
    fn test_flux_peaks_at_subsolar_latitude() {
        let equator = day_averaged_flux(0.0, 0.0);
        assert!((equator - 1.0).abs() < 1e-12);
        assert!(day_averaged_flux(1.0, 0.0) < equator);
        assert!(day_averaged_flux(-1.0, 0.0) < equator);
    }

    #[test]
    fn test_symmetric_planet_converges_symmetrically() {
        // Uniform land, no tilt: every season sees the same sky, so the
        // converged cycle must be season-invariant and hemisphere-symmetric.
        let planet = flat_planet(500.0);
        let params = no_tilt_params(4, 0.05);
        let cycle = singular_climate(&planet, &params).expect("must converge");

        let first = cycle.season(0);
        for season in cycle.seasons() {
            for t in 0..12 {
                assert!((season.temperature[t] - first.temperature[t]).abs() < 0.05);
            }
        }
        // Tiles at mirrored latitudes agree.
        for a in 0..12u32 {
            for b in 0..12u32 {
                if (planet.latitude(a) + planet.latitude(b)).abs() < 1e-9 {
                    assert!(
                        (first.temperature[a as usize] - first.temperature[b as usize]).abs()
                            < 1e-6
                    );
                }
            }
        }
    }

    #[test]
    fn test_constant_height_single_season_converges_fast() {
        // End to end: constant terrain, one season per cycle, loose delta.
        let planet = flat_planet(300.0);
        let params = no_tilt_params(1, 1.0);
        let mut cycles = 0;
        let cycle = singular_climate_with_progress(&planet, &params, |report| {
            cycles = report.cycle;
            true
        })
        .expect("must converge");
        assert!(cycles <= 2, "took more than 2 cycles");
        assert_eq!(cycle.seasons_per_cycle(), 1);
    }

    #[test]
    fn test_ocean_damps_seasonal_swing() {
        let grid = Arc::new(Grid::build(0));
        // Half land, half ocean at the same latitude band would be ideal;
        // uniform ocean against uniform land is the comparable proxy.
        let land = heightmap_to_planet(grid.clone(), vec![100.0; 12], 6371.0, DVec3::Z).unwrap();
        let ocean = heightmap_to_planet(grid, vec![-100.0; 12], 6371.0, DVec3::Z).unwrap();
        let params = ClimateParameters { axial_tilt: 23.4f64.to_radians(), ..Default::default() };

        let neutral = SeasonState::neutral(12);
        let land_state = climate_next(&land, &params, &neutral, 1);
        let ocean_state = climate_next(&ocean, &params, &neutral, 1);
        for t in 0..12 {
            let land_swing = (land_state.temperature[t] - FREEZING).abs();
            let ocean_swing = (ocean_state.temperature[t] - FREEZING).abs();
            assert!(ocean_swing <= land_swing + 1e-9);
        }
    }

    #[test]
    fn test_humidity_decay_from_half_life() {
        let params = no_tilt_params(4, 0.05);
        // One season is ~91.3 days; with a 30-day half-life the pool keeps
        // 0.5^(91.3/30) of itself.
        let expected = 0.5f64.powf((365.25 / 4.0) / 30.0);
        assert!((params.humidity_decay() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let planet = flat_planet(0.0);
        let params = no_tilt_params(0, 0.05);
        assert!(matches!(
            singular_climate(&planet, &params),
            Err(SingularClimateError::Config(_))
        ));
    }

    #[test]
    fn test_abort_between_cycles() {
        // Ocean relaxes asymptotically, so an impossibly tight delta keeps
        // the loop running until the hook pulls the plug.
        let planet = flat_planet(-100.0);
        let params = no_tilt_params(4, 1e-300);
        let result = singular_climate_with_progress(&planet, &params, |report| report.cycle < 3);
        assert!(matches!(
            result,
            Err(SingularClimateError::Climate(ClimateError::Aborted { cycle: 3 }))
        ));
    }
}
