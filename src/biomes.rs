//! Biome classification from converged climate
//!
//! Classifies every tile from its elevation and the full annual cycle of
//! climate fields: ocean depth classes, mountain/hill relief, forest types
//! from seasonal leaf-area variation, deserts from temperature extremes,
//! and wetlands from year-round precipitation on low flat land.

use crate::climate::{ClimateCycle, FREEZING};
use crate::planet::Planet;

// =============================================================================
// CLASSIFICATION THRESHOLDS
// =============================================================================

/// Elevation classes (meters).
const MOUNTAIN_ELEVATION: f64 = 825.0;
const HILL_ELEVATION: f64 = 500.0;
const MID_OCEAN: f64 = -1500.0;
const DEEP_OCEAN: f64 = -3500.0;

/// Leaf-area-index classes; the condition must hold during at least one
/// season.
const HEAVY_FOREST_LAI: f64 = 8.0;
const FOREST_LAI: f64 = 6.25;
const SAVANNA_LAI: f64 = 5.90;
const LAND_LAI: f64 = 4.0;

/// Deserts: warm if never below this across the year (K).
const SAND_DESERT_MIN_TEMPERATURE: f64 = 15.0 + 273.15;
/// Snowy if never above this across the year (K).
const SNOW_DESERT_MAX_TEMPERATURE: f64 = 10.0 + 273.15;

/// Wetlands: flat land raining at least this every unfrozen season (m/s).
const WETLANDS_PRECIPITATION: f64 = 2e-8;

/// Seasonal LAI spread bounds for the forest types.
const JUNGLE_SEASONAL_LAI_VARIATION: f64 = 2.0;
const BOREAL_SEASONAL_LAI_VARIATION: f64 = 6.5;
const DECIDUOUS_SEASONAL_LAI_VARIATION: f64 = 8.0;
const JUNGLE_MIN_TEMPERATURE: f64 = 30.0 + 273.15;

// =============================================================================
// BIOME MODEL
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relief {
    Flat,
    Hill,
    Mountain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForestKind {
    Jungle,
    Boreal,
    Mixed,
    Deciduous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Biome {
    DeepOcean,
    MidOcean,
    SurfaceOcean,
    Swamp,
    Marsh,
    Forest { kind: ForestKind, relief: Relief, heavy: bool },
    Mountain { snowbound: bool },
    Savanna { relief: Relief },
    Grass,
    SandDesert,
    SnowDesert,
    BareDesert,
}

impl Biome {
    pub fn is_ocean(&self) -> bool {
        matches!(self, Biome::DeepOcean | Biome::MidOcean | Biome::SurfaceOcean)
    }

    pub fn is_forest(&self) -> bool {
        matches!(self, Biome::Forest { .. })
    }

    pub fn is_desert(&self) -> bool {
        matches!(self, Biome::SandDesert | Biome::SnowDesert | Biome::BareDesert)
    }

    pub fn is_wetland(&self) -> bool {
        matches!(self, Biome::Swamp | Biome::Marsh)
    }

    pub fn name(&self) -> String {
        match self {
            Biome::DeepOcean => "Deep Ocean".to_string(),
            Biome::MidOcean => "Mid Ocean".to_string(),
            Biome::SurfaceOcean => "Surface Ocean".to_string(),
            Biome::Swamp => "Swamp".to_string(),
            Biome::Marsh => "Marsh".to_string(),
            Biome::Forest { kind, relief, heavy } => {
                let kind = match kind {
                    ForestKind::Jungle => "Jungle Forest",
                    ForestKind::Boreal => "Boreal Forest",
                    ForestKind::Mixed => "Mixed Forest",
                    ForestKind::Deciduous => "Deciduous Forest",
                };
                match (relief, heavy) {
                    (Relief::Mountain, _) => format!("Mountain {}", kind),
                    (Relief::Hill, _) => format!("Hill {}", kind),
                    (Relief::Flat, true) => format!("Heavy {}", kind),
                    (Relief::Flat, false) => kind.to_string(),
                }
            }
            Biome::Mountain { snowbound: true } => "Snow Mountain".to_string(),
            Biome::Mountain { snowbound: false } => "Mountain".to_string(),
            Biome::Savanna { relief: Relief::Hill } => "Hill Savanna".to_string(),
            Biome::Savanna { .. } => "Savanna".to_string(),
            Biome::Grass => "Grass".to_string(),
            Biome::SandDesert => "Sand Desert".to_string(),
            Biome::SnowDesert => "Snow Desert".to_string(),
            Biome::BareDesert => "Desert".to_string(),
        }
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Classify every tile of a planet with converged climate.
///
/// Panics if the planet has no climate cycle attached.
pub fn classify(planet: &Planet) -> Vec<Biome> {
    let cycle = planet
        .climate()
        .expect("biome classification requires a converged climate");
    (0..planet.tile_count() as u32)
        .map(|t| classify_tile(planet, cycle, t))
        .collect()
}

fn classify_tile(planet: &Planet, cycle: &ClimateCycle, tile: u32) -> Biome {
    let elevation = planet.elevation(tile);
    if elevation < DEEP_OCEAN {
        return Biome::DeepOcean;
    }
    if elevation < MID_OCEAN {
        return Biome::MidOcean;
    }
    if elevation < 0.0 {
        return Biome::SurfaceOcean;
    }

    let t = tile as usize;
    let seasons = cycle.seasons();
    let max_lai = fold_max(seasons.iter().map(|s| s.lai[t]));
    let min_lai = fold_min(seasons.iter().map(|s| s.lai[t]));
    let lai_spread = max_lai - min_lai;
    let max_temp = fold_max(seasons.iter().map(|s| s.temperature[t]));
    let min_temp = fold_min(seasons.iter().map(|s| s.temperature[t]));
    let frozen_seasons = seasons.iter().filter(|s| s.snow[t] > 0.0).count();

    let relief = if elevation > MOUNTAIN_ELEVATION {
        Relief::Mountain
    } else if elevation > HILL_ELEVATION {
        Relief::Hill
    } else {
        Relief::Flat
    };

    // Wetlands: low flat land wet (or frozen) every season, not frozen all
    // year round.
    let wet_all_year = seasons
        .iter()
        .all(|s| s.precipitation[t] > WETLANDS_PRECIPITATION || s.snow[t] > 0.0);
    if relief == Relief::Flat && wet_all_year && frozen_seasons < seasons.len() {
        return if max_lai > SAVANNA_LAI { Biome::Swamp } else { Biome::Marsh };
    }

    if max_lai > FOREST_LAI {
        let kind = if lai_spread < JUNGLE_SEASONAL_LAI_VARIATION && min_temp > JUNGLE_MIN_TEMPERATURE
        {
            ForestKind::Jungle
        } else if lai_spread < BOREAL_SEASONAL_LAI_VARIATION {
            ForestKind::Boreal
        } else if lai_spread > DECIDUOUS_SEASONAL_LAI_VARIATION {
            ForestKind::Deciduous
        } else {
            ForestKind::Mixed
        };
        let heavy = relief == Relief::Flat && max_lai > HEAVY_FOREST_LAI;
        return Biome::Forest { kind, relief, heavy };
    }

    if relief == Relief::Mountain {
        let snowbound = frozen_seasons == seasons.len()
            || seasons
                .iter()
                .all(|s| s.temperature[t] - elevation / 100.0 < FREEZING);
        return Biome::Mountain { snowbound };
    }

    if max_lai > SAVANNA_LAI {
        return Biome::Savanna { relief };
    }
    if max_lai > LAND_LAI {
        return Biome::Grass;
    }
    if min_temp > SAND_DESERT_MIN_TEMPERATURE {
        return Biome::SandDesert;
    }
    if max_temp < SNOW_DESERT_MAX_TEMPERATURE {
        return Biome::SnowDesert;
    }
    Biome::BareDesert
}

fn fold_max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::NEG_INFINITY, f64::max)
}

fn fold_min(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::INFINITY, f64::min)
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Aggregate biome shares for the CLI report (fractions of the tile count).
#[derive(Clone, Copy, Debug, Default)]
pub struct BiomeStats {
    pub total: usize,
    pub ocean: usize,
    pub land: usize,
    pub forest: usize,
    pub desert: usize,
    pub wetland: usize,
    pub grass: usize,
    pub savanna: usize,
    pub mountain: usize,
}

pub fn statistics(biomes: &[Biome]) -> BiomeStats {
    let mut stats = BiomeStats { total: biomes.len(), ..Default::default() };
    for biome in biomes {
        if biome.is_ocean() {
            stats.ocean += 1;
            continue;
        }
        stats.land += 1;
        if biome.is_forest() {
            stats.forest += 1;
        }
        if biome.is_desert() {
            stats.desert += 1;
        }
        if biome.is_wetland() {
            stats.wetland += 1;
        }
        match biome {
            Biome::Grass => stats.grass += 1,
            Biome::Savanna { .. } => stats.savanna += 1,
            Biome::Mountain { .. } => stats.mountain += 1,
            _ => {}
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::ClimateParameters;
    use crate::grid::Grid;
    use crate::planet::heightmap_to_planet;
    use glam::DVec3;
    use std::sync::Arc;

    fn classified(elevation: Vec<f64>) -> (Vec<Biome>, BiomeStats) {
        let grid = Arc::new(Grid::build(0));
        let planet = heightmap_to_planet(grid, elevation, 6371.0, DVec3::Z).unwrap();
        let params = ClimateParameters { acceptable_delta: 0.5, ..Default::default() };
        let planet = planet.with_climate(&params).expect("climate must converge");
        let biomes = classify(&planet);
        let stats = statistics(&biomes);
        (biomes, stats)
    }

    #[test]
    fn test_ocean_depth_classes() {
        let (biomes, stats) = classified(vec![
            -5000.0, -2000.0, -100.0, -5000.0, -2000.0, -100.0, -5000.0, -2000.0, -100.0, -5000.0,
            -2000.0, -100.0,
        ]);
        assert_eq!(stats.ocean, 12);
        assert_eq!(biomes[0], Biome::DeepOcean);
        assert_eq!(biomes[1], Biome::MidOcean);
        assert_eq!(biomes[2], Biome::SurfaceOcean);
    }

    #[test]
    fn test_land_and_ocean_partition() {
        let (_, stats) = classified((0..12).map(|t| t as f64 * 300.0 - 900.0).collect());
        assert_eq!(stats.ocean + stats.land, stats.total);
        assert!(stats.ocean > 0 && stats.land > 0);
    }

    #[test]
    fn test_mountain_relief_class() {
        // All land, one clear mountain; dry everywhere, so no forests.
        let mut elevation = vec![100.0; 12];
        elevation[0] = 2000.0;
        let (biomes, _) = classified(elevation);
        assert!(matches!(biomes[0], Biome::Mountain { .. }));
    }

    #[test]
    fn test_biome_names_are_stable() {
        let forest = Biome::Forest { kind: ForestKind::Boreal, relief: Relief::Flat, heavy: true };
        assert_eq!(forest.name(), "Heavy Boreal Forest");
        assert_eq!(Biome::Mountain { snowbound: true }.name(), "Snow Mountain");
        assert_eq!(Biome::Savanna { relief: Relief::Hill }.name(), "Hill Savanna");
    }
}
