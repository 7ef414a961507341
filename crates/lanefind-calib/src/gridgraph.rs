use crate::detector::Corner;
use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

fn direction_quadrant(v: &Vector2<f32>) -> NeighborDirection {
    if v.x.abs() > v.y.abs() {
        if v.x >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if v.y >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

/// Adjacent chessboard corners have orthogonal bright diagonals, and the
/// edge joining them sits at ~45° to both.
fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    params: &GridGraphParams,
) -> Option<NodeNeighbor> {
    let tol = params.orientation_tolerance_deg.to_radians();
    if !is_orthogonal(corner.orientation, neighbor.orientation, tol) {
        return None;
    }

    let v = neighbor.position - corner.position;
    let distance = v.norm();
    if distance < params.min_spacing_pix || distance > params.max_spacing_pix {
        return None;
    }

    let edge_angle = v.y.atan2(v.x);
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_corner > tol || score_neighbor > tol {
        return None;
    }

    let score_orientation =
        (FRAC_PI_2 - angle_diff_abs(corner.orientation, neighbor.orientation)).abs();

    Some(NodeNeighbor {
        direction: direction_quadrant(&v),
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbor per direction: shortest, then lowest score.
///
/// A corner further out along the same row can align better with the
/// orientations than the adjacent one, so distance wins.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = match candidate.direction {
            NeighborDirection::Right => &mut best[0],
            NeighborDirection::Left => &mut best[1],
            NeighborDirection::Up => &mut best[2],
            NeighborDirection::Down => &mut best[3],
        };
        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.distance < current.distance
                    || (candidate.distance == current.distance && candidate.score < current.score)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }

    best.into_iter().flatten().collect()
}

/// 4-connected corner graph.
pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Self {
        let coords: Vec<[f32; 2]> = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect();
        let tree: KdTree<f32, 2> = (&coords).into();

        let neighbors = corners
            .iter()
            .zip(&coords)
            .enumerate()
            .map(|(i, (corner, query))| {
                // The query point itself comes back as the nearest hit.
                let candidates = tree
                    .nearest_n::<SquaredEuclidean>(query, params.k_neighbors + 1)
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| j != i)
                    .filter_map(|j| is_good_neighbor(corner, &corners[j], j, params))
                    .collect();
                select_neighbors(candidates)
            })
            .collect();
        Self { neighbors }
    }

    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.neighbors.len()];
        let mut components = Vec::new();

        for start in 0..self.neighbors.len() {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                component.push(node);
                for n in &self.neighbors[node] {
                    if !visited[n.index] {
                        stack.push(n.index);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Integer grid coordinates by breadth-first growth from `start`.
    ///
    /// A node reached twice keeps its first coordinates; a cell claimed by
    /// two nodes keeps the first one.
    pub fn assign_grid_coordinates(&self, start: usize) -> HashMap<(i32, i32), usize> {
        let mut cells = HashMap::new();
        let mut visited = vec![false; self.neighbors.len()];
        let mut queue = VecDeque::new();
        queue.push_back((start, 0, 0));

        while let Some((node, i, j)) = queue.pop_front() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            if cells.contains_key(&(i, j)) {
                continue;
            }
            cells.insert((i, j), node);

            for n in &self.neighbors[node] {
                let (di, dj) = n.direction.step();
                queue.push_back((n.index, i + di, j + dj));
            }
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn make_corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner {
            position: Point2::new(x, y),
            orientation,
            strength: 1.0,
        }
    }

    fn regular_grid(cols: usize, rows: usize, spacing: f32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(make_corner(i as f32 * spacing, j as f32 * spacing, orientation));
            }
        }
        corners
    }

    #[test]
    fn finds_axis_neighbors_in_regular_grid() {
        let corners = regular_grid(3, 3, 10.0);
        let params = GridGraphParams {
            min_spacing_pix: 5.0,
            max_spacing_pix: 15.0,
            ..Default::default()
        };
        let graph = GridGraph::new(&corners, &params);
        let centre: HashMap<_, _> = graph.neighbors[4]
            .iter()
            .map(|n| (n.direction, n.index))
            .collect();
        assert_eq!(centre.len(), 4);
        assert_eq!(centre[&NeighborDirection::Left], 3);
        assert_eq!(centre[&NeighborDirection::Right], 5);
        assert_eq!(centre[&NeighborDirection::Up], 1);
        assert_eq!(centre[&NeighborDirection::Down], 7);
        assert_eq!(graph.neighbors[0].len(), 2);
    }

    #[test]
    fn adjacent_corner_wins_over_better_aligned_far_one() {
        // Slightly skewed adjacent corner versus a perfectly aligned one three
        // squares further along the same row.
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(10.0, 1.5, 3.0 * FRAC_PI_4),
            make_corner(30.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &GridGraphParams::default());
        let right: Vec<_> = graph.neighbors[0]
            .iter()
            .filter(|n| n.direction == NeighborDirection::Right)
            .map(|n| n.index)
            .collect();
        assert_eq!(right, vec![1]);
    }

    #[test]
    fn rejects_parallel_orientations() {
        let corners = vec![make_corner(0.0, 0.0, FRAC_PI_4), make_corner(10.0, 0.0, FRAC_PI_4)];
        let graph = GridGraph::new(&corners, &GridGraphParams::default());
        assert!(graph.neighbors.iter().all(Vec::is_empty));
    }

    #[test]
    fn bfs_labels_full_grid() {
        let corners = regular_grid(4, 3, 20.0);
        let graph = GridGraph::new(&corners, &GridGraphParams::default());
        assert_eq!(graph.connected_components().len(), 1);

        let cells = graph.assign_grid_coordinates(5);
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[&(0, 0)], 5);
        assert_eq!(cells[&(-1, -1)], 0);
        assert_eq!(cells[&(2, 1)], 11);
    }
}
