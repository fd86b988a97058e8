//! Heightmap to planet constructor
//!
//! Attaches physical geometry (radius, rotation axis, tile surface areas) to
//! a raw elevation field, and applies the sea-level shift that turns raw
//! elevations into ocean/land classification. Every stage consumes the prior
//! planet value and returns a new one; nothing is mutated in place.

use std::sync::Arc;

use glam::DVec3;

use crate::climate::ClimateCycle;
use crate::errors::ConfigError;
use crate::grid::Grid;

/// A geophysical planet: shared grid geometry plus the per-tile fields the
/// pipeline has produced so far.
pub struct Planet {
    pub grid: Arc<Grid>,
    /// Planet radius in kilometers.
    pub radius_km: f64,
    /// Rotation axis, unit length.
    pub axis: DVec3,
    /// Elevation per tile (meters, relative to sea level once applied).
    elevation: Vec<f64>,
    /// Surface area per tile (km^2).
    area: Vec<f64>,
    /// Downstream tile per land tile, `None` for sinks and ocean.
    flow: Option<Vec<Option<u32>>>,
    /// Accumulated upstream flow per tile.
    discharge: Option<Vec<f64>>,
    /// Converged per-season climate fields.
    climate: Option<ClimateCycle>,
}

/// Turn a raw elevation field on a unit-sphere grid into a planet with a
/// physical radius and rotation axis.
pub fn heightmap_to_planet(
    grid: Arc<Grid>,
    elevation: Vec<f64>,
    radius_km: f64,
    axis: DVec3,
) -> Result<Planet, ConfigError> {
    if elevation.len() != grid.tile_count() {
        return Err(ConfigError::invalid(
            "elevation",
            format!(
                "field has {} entries for a {}-tile grid",
                elevation.len(),
                grid.tile_count()
            ),
        ));
    }
    if radius_km <= 0.0 {
        return Err(ConfigError::invalid(
            "radius",
            format!("must be positive, got {}", radius_km),
        ));
    }
    if axis.length_squared() < 1e-12 {
        return Err(ConfigError::invalid("axis", "rotation axis must be non-zero"));
    }

    let area = tile_areas(&grid, radius_km);
    Ok(Planet {
        grid,
        radius_km,
        axis: axis.normalize(),
        elevation,
        area,
        flow: None,
        discharge: None,
        climate: None,
    })
}

impl Planet {
    /// Shift the elevation field uniformly so `target` becomes the new zero
    /// reference; afterwards land is exactly `elevation >= 0`.
    pub fn with_sea_level(mut self, target: f64) -> Planet {
        for v in &mut self.elevation {
            *v -= target;
        }
        self
    }

    /// Attach a river network (flow targets and discharge).
    pub fn with_rivers(mut self) -> Planet {
        let (flow, discharge) = crate::rivers::generate_rivers(&self);
        self.flow = Some(flow);
        self.discharge = Some(discharge);
        self
    }

    /// Run the seasonal climate simulation to its fixed point and attach
    /// the converged cycle.
    pub fn with_climate(
        self,
        params: &crate::climate::ClimateParameters,
    ) -> Result<Planet, crate::climate::SingularClimateError> {
        let cycle = crate::climate::singular_climate(&self, params)?;
        Ok(self.with_climate_cycle(cycle))
    }

    /// Attach an already-computed cycle; also the escape hatch for accepting
    /// a best-so-far cycle after non-convergence.
    pub fn with_climate_cycle(mut self, cycle: ClimateCycle) -> Planet {
        self.climate = Some(cycle);
        self
    }

    // -------------------------------------------------------------------------
    // Read accessors (the boundary export/visualization consumes)
    // -------------------------------------------------------------------------

    pub fn tile_count(&self) -> usize {
        self.grid.tile_count()
    }

    pub fn elevation(&self, tile: u32) -> f64 {
        self.check(tile);
        self.elevation[tile as usize]
    }

    pub fn elevations(&self) -> &[f64] {
        &self.elevation
    }

    /// Tile surface area in km^2.
    pub fn area(&self, tile: u32) -> f64 {
        self.check(tile);
        self.area[tile as usize]
    }

    /// Land is elevation at or above the (already applied) sea level.
    pub fn is_land(&self, tile: u32) -> bool {
        self.elevation(tile) >= 0.0
    }

    /// Latitude in radians relative to the rotation axis.
    pub fn latitude(&self, tile: u32) -> f64 {
        let sin_lat = self.grid.tile(tile).coord.dot(self.axis);
        sin_lat.clamp(-1.0, 1.0).asin()
    }

    /// Downstream tile of a land tile, if it has one.
    pub fn flow_target(&self, tile: u32) -> Option<u32> {
        self.check(tile);
        self.flow.as_ref().and_then(|f| f[tile as usize])
    }

    /// Accumulated upstream flow, 0.0 before rivers are generated.
    pub fn discharge(&self, tile: u32) -> f64 {
        self.check(tile);
        self.discharge.as_ref().map_or(0.0, |d| d[tile as usize])
    }

    pub fn climate(&self) -> Option<&ClimateCycle> {
        self.climate.as_ref()
    }

    fn check(&self, tile: u32) {
        assert!(
            (tile as usize) < self.tile_count(),
            "tile index out of range: {}",
            tile
        );
    }
}

/// Per-tile surface area from spherical geometry: the solid angle of the
/// tile's corner fan, scaled by radius^2. Summed over all tiles this gives
/// the full sphere area.
fn tile_areas(grid: &Grid, radius_km: f64) -> Vec<f64> {
    grid.tiles()
        .iter()
        .map(|tile| {
            let center = tile.coord;
            let mut solid_angle = 0.0;
            let n = tile.corners.len();
            for i in 0..n {
                let a = grid.corner_coord(tile.corners[i]);
                let b = grid.corner_coord(tile.corners[(i + 1) % n]);
                solid_angle += triangle_solid_angle(center, a, b);
            }
            solid_angle * radius_km * radius_km
        })
        .collect()
}

/// Solid angle of a spherical triangle (Van Oosterom & Strackee).
fn triangle_solid_angle(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    let numerator = a.dot(b.cross(c)).abs();
    let denominator = 1.0 + a.dot(b) + b.dot(c) + c.dot(a);
    2.0 * numerator.atan2(denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use std::f64::consts::PI;

    fn flat_planet(level: u32, elevation: f64) -> Planet {
        let grid = Arc::new(Grid::build(level));
        let count = grid.tile_count();
        heightmap_to_planet(grid, vec![elevation; count], 6371.0, DVec3::Z).unwrap()
    }

    #[test]
    fn test_areas_sum_to_sphere_surface() {
        let planet = flat_planet(1, 0.0);
        let total: f64 = (0..planet.tile_count() as u32).map(|t| planet.area(t)).sum();
        let sphere = 4.0 * PI * planet.radius_km * planet.radius_km;
        assert!(
            (total - sphere).abs() / sphere < 1e-9,
            "area sum {} vs sphere {}",
            total,
            sphere
        );
    }

    #[test]
    fn test_sea_level_classification_and_relief() {
        let grid = Arc::new(Grid::build(0));
        let raw: Vec<f64> = (0..12).map(|t| t as f64 * 100.0).collect();
        let planet = heightmap_to_planet(grid, raw.clone(), 6371.0, DVec3::Z)
            .unwrap()
            .with_sea_level(550.0);

        for t in 0..12u32 {
            let shifted = planet.elevation(t);
            assert_eq!(shifted, raw[t as usize] - 550.0);
            assert_eq!(planet.is_land(t), shifted >= 0.0);
        }
        // Relative relief between any two tiles is unchanged by the shift.
        for a in 0..12u32 {
            for b in 0..12u32 {
                let before = raw[a as usize] - raw[b as usize];
                let after = planet.elevation(a) - planet.elevation(b);
                assert!((before - after).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let grid = Arc::new(Grid::build(0));
        assert!(heightmap_to_planet(grid.clone(), vec![0.0; 5], 6371.0, DVec3::Z).is_err());
        assert!(heightmap_to_planet(grid.clone(), vec![0.0; 12], -1.0, DVec3::Z).is_err());
        assert!(heightmap_to_planet(grid, vec![0.0; 12], 6371.0, DVec3::ZERO).is_err());
    }

    #[test]
    fn test_latitude_spans_hemispheres() {
        let planet = flat_planet(0, 0.0);
        let latitudes: Vec<f64> = (0..12).map(|t| planet.latitude(t)).collect();
        assert!(latitudes.iter().any(|&l| l > 0.0));
        assert!(latitudes.iter().any(|&l| l < 0.0));
        for &l in &latitudes {
            assert!((-PI / 2.0..=PI / 2.0).contains(&l));
        }
    }
}
