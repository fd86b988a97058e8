//! Terrain algorithm registry and evaluator
//!
//! Heightmap algorithms are data: a small expression tree deserialized from a
//! fixed JSON source, evaluated against the full grid sequence `G0..GN`. The
//! reference "default" algorithm is a spherical coarse-to-fine displacement:
//! seed elevations on the 12-tile icosahedron, then at every finer level each
//! new tile interpolates its two parents and picks up a perturbation scaled
//! by `magnitude * persistence^octave`.

use std::collections::BTreeMap;
use std::sync::Arc;

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::grid::Grid;

/// The fixed external source the registry is populated from.
const BUILTIN_ALGORITHMS: &str = include_str!("../assets/algorithms.json");

/// Base sampling frequency for perturbation noise at level 0. Doubles per
/// octave so each level adds detail at its own spatial scale.
const BASE_FREQUENCY: f64 = 1.6;

// =============================================================================
// PARAMETERS
// =============================================================================

/// Tuning for a named terrain algorithm's displacement process.
#[derive(Clone, Debug)]
pub struct TerrainParameters {
    /// Registry name of the algorithm to run.
    pub algorithm: String,
    /// Number of displacement octaves.
    pub octaves: u32,
    /// Displacement amplitude at octave 0 (meters).
    pub magnitude: f64,
    /// Amplitude decay per octave (0-1].
    pub persistence: f64,
    /// Seed for the perturbation field and seed distribution.
    pub seed: u64,
}

impl TerrainParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.octaves == 0 {
            return Err(ConfigError::invalid("octaves", "must be at least 1"));
        }
        if self.magnitude <= 0.0 {
            return Err(ConfigError::invalid(
                "magnitude",
                format!("must be positive, got {}", self.magnitude),
            ));
        }
        if self.persistence <= 0.0 || self.persistence > 1.0 {
            return Err(ConfigError::invalid(
                "persistence",
                format!("must be in (0, 1], got {}", self.persistence),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// ALGORITHM EXPRESSIONS
// =============================================================================

/// A heightmap synthesis recipe. Evaluated against the grid sequence to
/// produce one elevation per tile of the finest grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum AlgorithmExpr {
    /// Coarse-to-fine displacement driven by the terrain parameters.
    Default,
    /// Uniform elevation.
    Constant { value: f64 },
    /// Multiply a field by a constant factor.
    Scale { factor: f64, expr: Box<AlgorithmExpr> },
    /// Shift a field down by `threshold`, so values below it become <= 0.
    /// Used to mask a feature field before conditional composition.
    Lower { threshold: f64, expr: Box<AlgorithmExpr> },
    /// Conditional composition: mountains only add relief where the
    /// continent field is already positive.
    Combine {
        continent: Box<AlgorithmExpr>,
        mountain: Box<AlgorithmExpr>,
    },
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Immutable name -> expression mapping for one algorithm category,
/// constructed once at startup.
pub struct AlgorithmRegistry {
    category: String,
    algorithms: BTreeMap<String, AlgorithmExpr>,
}

impl AlgorithmRegistry {
    /// Load a category from the built-in registry source.
    pub fn load(category: &str) -> Result<AlgorithmRegistry, ConfigError> {
        Self::load_from_str(BUILTIN_ALGORITHMS, category)
    }

    /// Load a category from external registry JSON
    /// (`category -> name -> expression`).
    pub fn load_from_str(json: &str, category: &str) -> Result<AlgorithmRegistry, ConfigError> {
        let mut categories: BTreeMap<String, BTreeMap<String, AlgorithmExpr>> =
            serde_json::from_str(json)?;
        let algorithms = categories
            .remove(category)
            .ok_or_else(|| ConfigError::UnknownCategory(category.to_string()))?;
        log::debug!(
            "loaded {} terrain algorithms from category `{}`",
            algorithms.len(),
            category
        );
        Ok(AlgorithmRegistry { category: category.to_string(), algorithms })
    }

    /// Look up an algorithm by name. Unknown names are configuration errors.
    pub fn get(&self, name: &str) -> Result<&AlgorithmExpr, ConfigError> {
        self.algorithms.get(name).ok_or_else(|| ConfigError::UnknownAlgorithm {
            category: self.category.clone(),
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.algorithms.keys().map(|s| s.as_str())
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Evaluate a named algorithm from the registry against the grid sequence.
pub fn generate_elevation(
    registry: &AlgorithmRegistry,
    grids: &[Arc<Grid>],
    params: &TerrainParameters,
) -> Result<Vec<f64>, ConfigError> {
    params.validate()?;
    let expr = registry.get(&params.algorithm)?;
    Ok(evaluate(expr, grids, params))
}

/// Evaluate an expression tree, producing one elevation per tile of the
/// finest grid.
pub fn evaluate(expr: &AlgorithmExpr, grids: &[Arc<Grid>], params: &TerrainParameters) -> Vec<f64> {
    let finest = grids.last().expect("grid sequence must not be empty");
    match expr {
        AlgorithmExpr::Default => eval_default(grids, params),
        AlgorithmExpr::Constant { value } => vec![*value; finest.tile_count()],
        AlgorithmExpr::Scale { factor, expr } => {
            let mut field = evaluate(expr, grids, params);
            for v in &mut field {
                *v *= factor;
            }
            field
        }
        AlgorithmExpr::Lower { threshold, expr } => {
            elevation_lower(*threshold, evaluate(expr, grids, params))
        }
        AlgorithmExpr::Combine { continent, mountain } => {
            let continent = evaluate(continent, grids, params);
            let mountain = evaluate(mountain, grids, params);
            combine(&continent, &mountain)
        }
    }
}

/// Shift every elevation down by `threshold`, so values below the threshold
/// become <= 0 and get masked out by `combine`.
pub fn elevation_lower(threshold: f64, mut field: Vec<f64>) -> Vec<f64> {
    for v in &mut field {
        *v -= threshold;
    }
    field
}

/// Conditional composition of two fields on the same grid: for every tile,
/// `final = continent + mountain` iff both are positive there, else
/// `final = continent`.
pub fn combine(continent: &[f64], mountain: &[f64]) -> Vec<f64> {
    assert_eq!(continent.len(), mountain.len(), "fields must share a grid");
    continent
        .iter()
        .zip(mountain)
        .map(|(&c, &m)| if m > 0.0 && c > 0.0 { c + m } else { c })
        .collect()
}

/// The reference coarse-to-fine displacement algorithm.
fn eval_default(grids: &[Arc<Grid>], params: &TerrainParameters) -> Vec<f64> {
    let noise = Perlin::new(params.seed as u32);

    // Seed distribution on the coarsest grid.
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut elevation: Vec<f64> = grids[0]
        .tiles()
        .iter()
        .map(|_| params.magnitude * rng.gen_range(-1.0..1.0))
        .collect();

    // Refinement: carried tiles keep their value, new tiles interpolate
    // their parents plus an octave-scaled perturbation.
    for (level, grid) in grids.iter().enumerate().skip(1) {
        let prev_count = grids[level - 1].tile_count() as u32;
        let amplitude = octave_amplitude(level as u32, params);
        let frequency = BASE_FREQUENCY * 2f64.powi(level as i32);

        let mut next = Vec::with_capacity(grid.tile_count());
        for tile in grid.tiles() {
            if tile.id < prev_count {
                next.push(elevation[tile.id as usize]);
            } else {
                let (a, b) = grid
                    .parents(tile.id)
                    .expect("refined tile must record its parents");
                let base = (elevation[a as usize] + elevation[b as usize]) / 2.0;
                next.push(base + amplitude * sample(&noise, tile.coord, frequency));
            }
        }
        elevation = next;
    }

    // Octaves beyond the grid depth add finer detail directly on the finest
    // grid, so a deep octave count still runs its full displacement process.
    let finest = grids.last().expect("grid sequence must not be empty");
    for octave in grids.len() as u32..params.octaves + 1 {
        let amplitude = params.magnitude * params.persistence.powi(octave as i32);
        let frequency = BASE_FREQUENCY * 2f64.powi(octave as i32);
        for (tile, v) in finest.tiles().iter().zip(&mut elevation) {
            *v += amplitude * sample(&noise, tile.coord, frequency);
        }
    }

    elevation
}

/// Perturbation amplitude at a refinement level: `magnitude * persistence^o`
/// up to the requested octave count, zero afterwards (pure interpolation).
fn octave_amplitude(level: u32, params: &TerrainParameters) -> f64 {
    if level <= params.octaves {
        params.magnitude * params.persistence.powi(level as i32)
    } else {
        0.0
    }
}

fn sample(noise: &Perlin, coord: glam::DVec3, frequency: f64) -> f64 {
    noise.get([coord.x * frequency, coord.y * frequency, coord.z * frequency])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn test_params(algorithm: &str) -> TerrainParameters {
        TerrainParameters {
            algorithm: algorithm.to_string(),
            octaves: 4,
            magnitude: 1000.0,
            persistence: 0.6,
            seed: 42,
        }
    }

    #[test]
    fn test_builtin_registry_loads() {
        let registry = AlgorithmRegistry::load("terrain").unwrap();
        assert!(registry.names().any(|n| n == "default"));
    }

    #[test]
    fn test_unknown_algorithm_names_missing_key() {
        let registry = AlgorithmRegistry::load("terrain").unwrap();
        let err = registry.get("no-such-algorithm").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("no-such-algorithm"));
        assert!(message.contains("terrain"));
    }

    #[test]
    fn test_unknown_category_is_config_error() {
        assert!(matches!(
            AlgorithmRegistry::load("no-such-category"),
            Err(ConfigError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_composition_law_on_level_zero_grid() {
        // Hand-picked 12-entry fields: every sign combination appears.
        let continent = [
            100.0, -50.0, 200.0, 0.0, -10.0, 300.0, 45.0, -200.0, 80.0, 15.0, -1.0, 60.0,
        ];
        let mountain = [
            50.0, 40.0, -30.0, 70.0, -5.0, 0.0, 25.0, -60.0, 90.0, -15.0, 35.0, 0.5,
        ];
        let combined = combine(&continent, &mountain);
        for t in 0..12 {
            let expected = if mountain[t] > 0.0 && continent[t] > 0.0 {
                continent[t] + mountain[t]
            } else {
                continent[t]
            };
            assert_eq!(combined[t], expected, "tile {}", t);
        }
    }

    #[test]
    fn test_elevation_lower_shifts_uniformly() {
        let field = vec![500.0, 100.0, -200.0];
        let lowered = elevation_lower(100.0, field.clone());
        assert_eq!(lowered, vec![400.0, 0.0, -300.0]);
        // Relative relief is untouched.
        assert_eq!(lowered[0] - lowered[1], field[0] - field[1]);
    }

    #[test]
    fn test_default_is_deterministic_and_coarse_consistent() {
        let grids = Grid::build_sequence(2);
        let params = test_params("default");
        let a = eval_default(&grids, &params);
        let b = eval_default(&grids, &params);
        assert_eq!(a.len(), grids[2].tile_count());
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_expression() {
        let grids = Grid::build_sequence(0);
        let field = evaluate(&AlgorithmExpr::Constant { value: 250.0 }, &grids, &test_params("default"));
        assert_eq!(field, vec![250.0; 12]);
    }

    #[test]
    fn test_parameter_validation() {
        let mut params = test_params("default");
        params.persistence = 1.5;
        assert!(matches!(params.validate(), Err(ConfigError::InvalidParameter { .. })));
    }
}
