//! Geodesic grid builder
//!
//! Builds the spherical tile mesh by repeated subdivision of an icosahedron's
//! dual: tiles sit at the triangulation vertices, corners at the triangle
//! faces. Level 0 is the bare icosahedron (12 pentagonal tiles, 20 corners);
//! each subdivision inserts a new tile at every edge midpoint, splits each
//! face into four, and projects everything back onto the unit sphere.
//!
//! Tile ids are stable across levels: tile `t` of grid L denotes the same
//! spatial region in grid L+1, which is what lets the terrain evaluator walk
//! the whole grid sequence coarse-to-fine.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec3;

// =============================================================================
// MESH ELEMENTS
// =============================================================================

/// A mesh cell (pentagon or hexagon) on the unit sphere.
#[derive(Clone, Debug)]
pub struct Tile {
    pub id: u32,
    /// Center coordinate, unit length.
    pub coord: DVec3,
    /// Adjacent tile ids, ordered counter-clockwise around the center.
    pub neighbors: Vec<u32>,
    /// Corner ids, ordered counter-clockwise around the center.
    pub corners: Vec<u32>,
    /// The two coarser-level tiles this tile's edge midpoint interpolates
    /// between. `None` for the 12 icosahedron seed tiles.
    pub parents: Option<(u32, u32)>,
}

impl Tile {
    /// Pentagons (the 12 seed tiles) have 5 corners, all other tiles 6.
    pub fn is_pentagon(&self) -> bool {
        self.corners.len() == 5
    }
}

/// A vertex shared by exactly 3 tiles.
#[derive(Clone, Debug)]
pub struct Corner {
    pub id: u32,
    /// Coordinate, unit length.
    pub coord: DVec3,
    /// The 3 tiles meeting at this corner.
    pub tiles: [u32; 3],
    /// The 3 corners sharing an edge with this corner.
    pub corners: [u32; 3],
}

/// An immutable spherical mesh at a fixed subdivision level.
pub struct Grid {
    pub level: u32,
    tiles: Vec<Tile>,
    corners: Vec<Corner>,
}

// =============================================================================
// INTERNAL TRIANGULATION
// =============================================================================

/// The dual triangulation a grid is derived from: tiles are vertices,
/// corners are faces.
struct Triangulation {
    coords: Vec<DVec3>,
    faces: Vec<[u32; 3]>,
    parents: Vec<Option<(u32, u32)>>,
}

/// Golden-ratio icosahedron, vertices normalized to the unit sphere.
fn base_icosahedron() -> Triangulation {
    let p = (1.0 + 5.0f64.sqrt()) / 2.0;
    let raw = [
        (-1.0, p, 0.0),
        (1.0, p, 0.0),
        (-1.0, -p, 0.0),
        (1.0, -p, 0.0),
        (0.0, -1.0, p),
        (0.0, 1.0, p),
        (0.0, -1.0, -p),
        (0.0, 1.0, -p),
        (p, 0.0, -1.0),
        (p, 0.0, 1.0),
        (-p, 0.0, -1.0),
        (-p, 0.0, 1.0),
    ];
    let coords: Vec<DVec3> = raw
        .iter()
        .map(|&(x, y, z)| DVec3::new(x, y, z).normalize())
        .collect();
    let faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    let parents = vec![None; coords.len()];
    Triangulation { coords, faces, parents }
}

/// Split every face into four, inserting a normalized midpoint vertex on
/// every edge. Existing vertex ids (and their coordinates) are untouched.
fn subdivide_triangulation(tri: &Triangulation) -> Triangulation {
    let mut coords = tri.coords.clone();
    let mut parents = tri.parents.clone();
    let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
    let mut faces = Vec::with_capacity(tri.faces.len() * 4);

    let mut midpoint = |a: u32, b: u32, coords: &mut Vec<DVec3>, parents: &mut Vec<Option<(u32, u32)>>| -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        *midpoints.entry(key).or_insert_with(|| {
            let mid = (coords[a as usize] + coords[b as usize]).normalize();
            let id = coords.len() as u32;
            coords.push(mid);
            parents.push(Some(key));
            id
        })
    };

    for &[v0, v1, v2] in &tri.faces {
        let m01 = midpoint(v0, v1, &mut coords, &mut parents);
        let m12 = midpoint(v1, v2, &mut coords, &mut parents);
        let m20 = midpoint(v2, v0, &mut coords, &mut parents);
        faces.push([v0, m01, m20]);
        faces.push([v1, m12, m01]);
        faces.push([v2, m20, m12]);
        faces.push([m01, m12, m20]);
    }

    Triangulation { coords, faces, parents }
}

/// Sort a set of points counter-clockwise around `center` (viewed from
/// outside the sphere), using an arbitrary tangent frame.
fn sort_around(center: DVec3, items: &mut [(u32, DVec3)]) {
    // Any vector not parallel to the center works as a frame seed.
    let seed = if center.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
    let u = seed.cross(center).normalize();
    let v = center.cross(u);
    items.sort_by(|a, b| {
        let pa = (a.1 - center).dot(v).atan2((a.1 - center).dot(u));
        let pb = (b.1 - center).dot(v).atan2((b.1 - center).dot(u));
        pa.partial_cmp(&pb).unwrap()
    });
}

/// Derive the tile/corner mesh from a triangulation.
fn grid_from_triangulation(level: u32, tri: &Triangulation) -> Grid {
    let tile_count = tri.coords.len();
    let corner_count = tri.faces.len();

    // Corner positions: normalized face centroids.
    let corner_coords: Vec<DVec3> = tri
        .faces
        .iter()
        .map(|f| {
            (tri.coords[f[0] as usize] + tri.coords[f[1] as usize] + tri.coords[f[2] as usize])
                .normalize()
        })
        .collect();

    // Faces touching each vertex, and the face pair sharing each edge.
    let mut vertex_faces: Vec<Vec<u32>> = vec![Vec::with_capacity(6); tile_count];
    let mut edge_faces: HashMap<(u32, u32), [u32; 2]> = HashMap::new();
    for (fi, face) in tri.faces.iter().enumerate() {
        for i in 0..3 {
            let a = face[i];
            let b = face[(i + 1) % 3];
            vertex_faces[a as usize].push(fi as u32);
            let key = if a < b { (a, b) } else { (b, a) };
            let entry = edge_faces.entry(key).or_insert([u32::MAX, u32::MAX]);
            if entry[0] == u32::MAX {
                entry[0] = fi as u32;
            } else {
                entry[1] = fi as u32;
            }
        }
    }

    let tiles: Vec<Tile> = (0..tile_count)
        .map(|t| {
            let coord = tri.coords[t];

            let mut corners: Vec<(u32, DVec3)> = vertex_faces[t]
                .iter()
                .map(|&f| (f, corner_coords[f as usize]))
                .collect();
            sort_around(coord, &mut corners);

            let mut neighbors: Vec<(u32, DVec3)> = Vec::with_capacity(6);
            for &[a, b, c] in vertex_faces[t].iter().map(|&f| &tri.faces[f as usize]) {
                for v in [a, b, c] {
                    if v != t as u32 && !neighbors.iter().any(|&(id, _)| id == v) {
                        neighbors.push((v, tri.coords[v as usize]));
                    }
                }
            }
            sort_around(coord, &mut neighbors);

            Tile {
                id: t as u32,
                coord,
                neighbors: neighbors.into_iter().map(|(id, _)| id).collect(),
                corners: corners.into_iter().map(|(id, _)| id).collect(),
                parents: tri.parents[t],
            }
        })
        .collect();

    let corners: Vec<Corner> = (0..corner_count)
        .map(|c| {
            let face = tri.faces[c];
            let mut adjacent = [0u32; 3];
            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                let pair = edge_faces[&key];
                adjacent[i] = if pair[0] == c as u32 { pair[1] } else { pair[0] };
            }
            Corner {
                id: c as u32,
                coord: corner_coords[c],
                tiles: face,
                corners: adjacent,
            }
        })
        .collect();

    Grid { level, tiles, corners }
}

// =============================================================================
// PUBLIC API
// =============================================================================

impl Grid {
    /// Build the grid at the given subdivision level.
    pub fn build(level: u32) -> Grid {
        let mut tri = base_icosahedron();
        for _ in 0..level {
            tri = subdivide_triangulation(&tri);
        }
        grid_from_triangulation(level, &tri)
    }

    /// Build the full sequence `G0..=G(level)`, shared read-only.
    pub fn build_sequence(level: u32) -> Vec<Arc<Grid>> {
        let mut tri = base_icosahedron();
        let mut grids = vec![Arc::new(grid_from_triangulation(0, &tri))];
        for l in 1..=level {
            tri = subdivide_triangulation(&tri);
            grids.push(Arc::new(grid_from_triangulation(l, &tri)));
        }
        grids
    }

    /// Refine this grid by one level. Tile ids of `self` are preserved.
    pub fn subdivide(&self) -> Grid {
        let tri = Triangulation {
            coords: self.tiles.iter().map(|t| t.coord).collect(),
            faces: self.corners.iter().map(|c| c.tiles).collect(),
            parents: self.tiles.iter().map(|t| t.parents).collect(),
        };
        grid_from_triangulation(self.level + 1, &subdivide_triangulation(&tri))
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn corner_count(&self) -> usize {
        self.corners.len()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }

    pub fn tile(&self, id: u32) -> &Tile {
        assert!((id as usize) < self.tiles.len(), "tile index out of range: {}", id);
        &self.tiles[id as usize]
    }

    pub fn corner(&self, id: u32) -> &Corner {
        assert!((id as usize) < self.corners.len(), "corner index out of range: {}", id);
        &self.corners[id as usize]
    }

    /// The `i`-th corner around tile `id`, counter-clockwise.
    pub fn tile_corner(&self, id: u32, i: usize) -> u32 {
        let tile = self.tile(id);
        assert!(i < tile.corners.len(), "corner offset out of range: {}", i);
        tile.corners[i]
    }

    /// The `i`-th neighbor of tile `id`, counter-clockwise.
    pub fn tile_neighbor(&self, id: u32, i: usize) -> u32 {
        let tile = self.tile(id);
        assert!(i < tile.neighbors.len(), "neighbor offset out of range: {}", i);
        tile.neighbors[i]
    }

    pub fn corner_coord(&self, id: u32) -> DVec3 {
        self.corner(id).coord
    }

    /// The two coarser-level tiles a refined tile interpolates between.
    pub fn parents(&self, id: u32) -> Option<(u32, u32)> {
        self.tile(id).parents
    }
}

/// Tile count at a subdivision level: `10 * 4^level + 2`.
pub fn tile_count_at(level: u32) -> usize {
    10 * 4usize.pow(level) + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_and_corner_counts() {
        for level in 0..3 {
            let grid = Grid::build(level);
            assert_eq!(grid.tile_count(), tile_count_at(level));
            assert_eq!(grid.tile_count(), 10 * 4usize.pow(level) + 2);
            assert_eq!(grid.corner_count(), 20 * 4usize.pow(level));
        }
    }

    #[test]
    fn test_exactly_twelve_pentagons() {
        for level in 0..3 {
            let grid = Grid::build(level);
            let pentagons = grid.tiles().iter().filter(|t| t.is_pentagon()).count();
            assert_eq!(pentagons, 12);
            for tile in grid.tiles() {
                assert!(tile.corners.len() == 5 || tile.corners.len() == 6);
                assert_eq!(tile.neighbors.len(), tile.corners.len());
            }
        }
    }

    #[test]
    fn test_corner_adjacency() {
        let grid = Grid::build(2);
        for corner in grid.corners() {
            // Exactly 3 distinct tiles and 3 distinct corners.
            let mut tiles = corner.tiles;
            tiles.sort_unstable();
            assert!(tiles.windows(2).all(|w| w[0] != w[1]));
            let mut corners = corner.corners;
            corners.sort_unstable();
            assert!(corners.windows(2).all(|w| w[0] != w[1]));
            // Adjacency is symmetric.
            for &other in &corner.corners {
                assert!(grid.corner(other).corners.contains(&corner.id));
            }
        }
    }

    #[test]
    fn test_neighbor_symmetry() {
        let grid = Grid::build(1);
        for tile in grid.tiles() {
            for &n in &tile.neighbors {
                assert!(grid.tile(n).neighbors.contains(&tile.id));
            }
        }
    }

    #[test]
    fn test_subdivision_preserves_tile_ids() {
        let coarse = Grid::build(1);
        let fine = coarse.subdivide();
        assert_eq!(fine.level, 2);
        assert_eq!(fine.tile_count(), tile_count_at(2));
        for tile in coarse.tiles() {
            let refined = fine.tile(tile.id);
            assert!((refined.coord - tile.coord).length() < 1e-12);
        }
    }

    #[test]
    fn test_refined_tiles_record_parents() {
        let grids = Grid::build_sequence(2);
        let coarse_count = grids[1].tile_count() as u32;
        for tile in grids[2].tiles() {
            if tile.id >= coarse_count {
                let (a, b) = tile.parents.expect("new tile must have parents");
                assert!(a < coarse_count && b < coarse_count);
                // The midpoint sits between its parents.
                let mid = (grids[1].tile(a).coord + grids[1].tile(b).coord).normalize();
                assert!((mid - tile.coord).length() < 1e-12);
            }
        }
    }

    #[test]
    fn test_coords_are_unit_length() {
        let grid = Grid::build(1);
        for tile in grid.tiles() {
            assert!((tile.coord.length() - 1.0).abs() < 1e-12);
        }
        for corner in grid.corners() {
            assert!((corner.coord.length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    #[should_panic(expected = "tile index out of range")]
    fn test_bad_tile_index_panics() {
        Grid::build(0).tile(99);
    }
}
