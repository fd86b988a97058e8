//! Planet export
//!
//! Writes the season-indexed dump the downstream imaging tooling consumes:
//! a Python-literal module with one entry per tile per season, holding the
//! scalar fields plus the tile's corner polygon. Built purely on the
//! planet's read accessors; presentation-side remapping (diamond slices,
//! projections) lives entirely downstream of this file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::planet::Planet;

/// Write the full per-season dump as a Python module defining `planet`:
/// a list over seasons of `{tile_id: {field: value, ..., 'coords': [...]}}`.
pub fn export_planet(planet: &Planet, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    let cycle = planet.climate();
    let seasons = cycle.map_or(1, |c| c.seasons_per_cycle());

    writeln!(out, "planet = [")?;
    for season in 0..seasons {
        writeln!(out, "    {{")?;
        for t in 0..planet.tile_count() as u32 {
            write!(
                out,
                "        {}: {{'elevation': {:.3}, 'area': {:.3}, 'discharge': {:.1}",
                t,
                planet.elevation(t),
                planet.area(t),
                planet.discharge(t),
            )?;
            if let Some(cycle) = cycle {
                let state = cycle.season(season);
                let i = t as usize;
                write!(
                    out,
                    ", 'insolation': {:.6}, 'temperature': {:.3}, 'humidity': {:.6}, \
                     'precipitation': {:.6e}, 'snow': {:.4}, 'lai': {:.4}",
                    state.insolation[i],
                    state.temperature[i],
                    state.humidity[i],
                    state.precipitation[i],
                    state.snow[i],
                    state.lai[i],
                )?;
            }
            write!(out, ", 'coords': [")?;
            let tile = planet.grid.tile(t);
            for (i, &corner) in tile.corners.iter().enumerate() {
                let c = planet.grid.corner_coord(corner);
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "({:.9}, {:.9}, {:.9})", c.x, c.y, c.z)?;
            }
            writeln!(out, "]}},")?;
        }
        writeln!(out, "    }},")?;
    }
    writeln!(out, "]")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::ClimateParameters;
    use crate::grid::Grid;
    use crate::planet::heightmap_to_planet;
    use glam::DVec3;
    use std::sync::Arc;

    #[test]
    fn test_export_writes_every_tile_and_season() {
        let grid = Arc::new(Grid::build(0));
        let elevation: Vec<f64> = (0..12).map(|t| t as f64 * 200.0 - 600.0).collect();
        let planet = heightmap_to_planet(grid, elevation, 6371.0, DVec3::Z)
            .unwrap()
            .with_sea_level(0.0)
            .with_rivers();
        let params = ClimateParameters {
            seasons_per_cycle: 2,
            acceptable_delta: 0.5,
            ..Default::default()
        };
        let planet = planet.with_climate(&params).unwrap();

        let dir = std::env::temp_dir().join("planet_simulator_export_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("planet_dump.py");
        export_planet(&planet, &path).unwrap();

        let dump = std::fs::read_to_string(&path).unwrap();
        assert!(dump.starts_with("planet = ["));
        assert_eq!(dump.matches("'temperature'").count(), 2 * 12);
        assert!(dump.contains("'coords'"));
        std::fs::remove_file(&path).ok();
    }
}
