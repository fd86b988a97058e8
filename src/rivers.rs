//! Steepest-descent river generator
//!
//! Every land tile drains to its strictly lowest land neighbor (ties broken
//! by lowest tile id), or terminates as a sink when no land neighbor is
//! strictly lower, including at the coast where every lower neighbor is
//! ocean. Because flow only ever moves strictly downhill the downstream
//! relation is acyclic; discharge accumulates in a single pass over land
//! tiles ordered by descending elevation, so every upstream total is final
//! before it is added downstream.

use crate::planet::Planet;

/// Compute flow targets and discharge for a planet's land tiles.
///
/// Returns `(flow, discharge)`: one optional downstream tile per tile
/// (always `None` for ocean), and the accumulated flow per tile (1 unit per
/// land tile plus everything that drains through it).
pub fn generate_rivers(planet: &Planet) -> (Vec<Option<u32>>, Vec<f64>) {
    let count = planet.tile_count();
    let flow = flow_targets(planet);

    // Flow must strictly decrease in elevation; anything else means the
    // routing above is broken, not a recoverable input problem.
    for t in 0..count as u32 {
        if let Some(target) = flow[t as usize] {
            assert!(
                planet.elevation(target) < planet.elevation(t),
                "flow cycle hazard: tile {} drains to non-lower tile {}",
                t,
                target
            );
        }
    }

    let mut discharge = vec![0.0; count];
    let mut land: Vec<u32> = (0..count as u32).filter(|&t| planet.is_land(t)).collect();
    for &t in &land {
        discharge[t as usize] = 1.0;
    }

    // Strictly descending source elevation: upstream before downstream.
    land.sort_by(|&a, &b| {
        planet
            .elevation(b)
            .partial_cmp(&planet.elevation(a))
            .unwrap()
            .then(a.cmp(&b))
    });
    for &t in &land {
        if let Some(target) = flow[t as usize] {
            discharge[target as usize] += discharge[t as usize];
        }
    }

    (flow, discharge)
}

/// Pick each land tile's downstream neighbor: the land neighbor with the
/// strictly lowest elevation, strictly below the tile itself, lowest id on
/// ties. Ocean neighbors never qualify.
fn flow_targets(planet: &Planet) -> Vec<Option<u32>> {
    (0..planet.tile_count() as u32)
        .map(|t| {
            if !planet.is_land(t) {
                return None;
            }
            let own = planet.elevation(t);
            let mut best: Option<(f64, u32)> = None;
            for &n in &planet.grid.tile(t).neighbors {
                // Rivers end at the coast: an ocean neighbor is never a
                // downstream target, so coastal tiles are sinks.
                if !planet.is_land(n) {
                    continue;
                }
                let elev = planet.elevation(n);
                if elev >= own {
                    continue;
                }
                let candidate = (elev, n);
                best = match best {
                    None => Some(candidate),
                    Some((be, bn)) => {
                        if elev < be || (elev == be && n < bn) {
                            Some(candidate)
                        } else {
                            Some((be, bn))
                        }
                    }
                };
            }
            best.map(|(_, n)| n)
        })
        .collect()
}
