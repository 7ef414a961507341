use crate::gridgraph::GridGraph;
use crate::params::ChessboardParams;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use kiddo::{KdTree, SquaredEuclidean};
use lanefind_core::GrayImageView;
use log::{debug, info};
use nalgebra::{Point2, Vector2};
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A ChESS X-junction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    /// Sub-pixel position.
    pub position: Point2<f32>,
    /// Direction of the bright diagonal, radians modulo π.
    pub orientation: f32,
    pub strength: f32,
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: c.orientation,
        strength: c.response,
    }
}

/// ChESS corners of `img` via `chess-corners`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, cfg), fields(width = img.width, height = img.height))
)]
pub fn detect_corners(img: &GrayImageView<'_>, cfg: &ChessConfig) -> Vec<Corner> {
    let Some(buffer) =
        ::image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.to_vec())
    else {
        debug!("gray view {}x{} does not match its buffer", img.width, img.height);
        return Vec::new();
    };
    let corners: Vec<Corner> = find_chess_corners_image(&buffer, cfg)
        .iter()
        .map(adapt_chess_corner)
        .collect();
    debug!("ChESS: {} corners", corners.len());
    corners
}

/// Keep the strongest corner of every cluster closer than `min_distance`.
///
/// Blurred junctions can produce two response peaks a pixel apart; both
/// would claim the same grid cell.
pub fn suppress_duplicates(mut corners: Vec<Corner>, min_distance: f32) -> Vec<Corner> {
    corners.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    let coords: Vec<[f32; 2]> = corners
        .iter()
        .map(|c| [c.position.x, c.position.y])
        .collect();
    let tree: KdTree<f32, 2> = (&coords).into();

    let min_sq = min_distance * min_distance;
    let mut keep = vec![true; corners.len()];
    for (i, query) in coords.iter().enumerate() {
        if !keep[i] {
            continue;
        }
        for nn in tree.within_unsorted::<SquaredEuclidean>(query, min_sq) {
            let j = nn.item as usize;
            if j > i && nn.distance < min_sq {
                keep[j] = false;
            }
        }
    }
    corners
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect()
}

/// A complete `cols x rows` inner-corner grid, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ChessboardCorners {
    pub cols: usize,
    pub rows: usize,
    pub points: Vec<Point2<f32>>,
    /// Summed ChESS strength of the selected corners.
    pub strength: f32,
}

impl ChessboardCorners {
    pub fn point(&self, col: usize, row: usize) -> Point2<f32> {
        self.points[row * self.cols + col]
    }
}

struct Window {
    i0: i32,
    j0: i32,
    transposed: bool,
    strength: f32,
}

fn cell_at(w: &Window, c: usize, r: usize) -> (i32, i32) {
    if w.transposed {
        (w.i0 + r as i32, w.j0 + c as i32)
    } else {
        (w.i0 + c as i32, w.j0 + r as i32)
    }
}

/// Strongest complete window over the labelled cells, trying both
/// board orientations.
fn best_window(
    cells: &HashMap<(i32, i32), usize>,
    corners: &[Corner],
    cols: usize,
    rows: usize,
) -> Option<Window> {
    let (mut i_min, mut i_max, mut j_min, mut j_max) = (i32::MAX, i32::MIN, i32::MAX, i32::MIN);
    for &(i, j) in cells.keys() {
        i_min = i_min.min(i);
        i_max = i_max.max(i);
        j_min = j_min.min(j);
        j_max = j_max.max(j);
    }

    let mut best: Option<Window> = None;
    let layouts: &[bool] = if cols == rows { &[false] } else { &[false, true] };
    for &transposed in layouts {
        let (span_i, span_j) = if transposed { (rows, cols) } else { (cols, rows) };
        for i0 in i_min..=i_max - span_i as i32 + 1 {
            'next: for j0 in j_min..=j_max - span_j as i32 + 1 {
                let mut window = Window {
                    i0,
                    j0,
                    transposed,
                    strength: 0.0,
                };
                for r in 0..rows {
                    for c in 0..cols {
                        match cells.get(&cell_at(&window, c, r)) {
                            Some(&idx) => window.strength += corners[idx].strength,
                            None => continue 'next,
                        }
                    }
                }
                if best.as_ref().is_none_or(|b| window.strength > b.strength) {
                    best = Some(window);
                }
            }
        }
    }
    best
}

/// Whether `d` points against the image axes along its dominant component.
fn runs_backwards(d: Vector2<f32>) -> bool {
    if d.x.abs() >= d.y.abs() {
        d.x < 0.0
    } else {
        d.y < 0.0
    }
}

/// Flip the labelling so both board axes run along increasing image x or y.
fn canonicalize(points: &mut [Point2<f32>], cols: usize, rows: usize) {
    let at = |p: &[Point2<f32>], c: usize, r: usize| p[r * cols + c];
    if runs_backwards(at(points, cols - 1, 0) - at(points, 0, 0)) {
        for row in points.chunks_mut(cols) {
            row.reverse();
        }
    }
    if runs_backwards(at(points, 0, rows - 1) - at(points, 0, 0)) {
        for r in 0..rows / 2 {
            for c in 0..cols {
                points.swap(r * cols + c, (rows - 1 - r) * cols + c);
            }
        }
    }
}

/// Find a complete `params.cols x params.rows` inner-corner grid.
///
/// Returns `None` when no connected corner cluster contains the full
/// pattern; partial boards are never reported.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(cols = params.cols, rows = params.rows))
)]
pub fn detect_chessboard(
    img: &GrayImageView<'_>,
    params: &ChessboardParams,
) -> Option<ChessboardCorners> {
    let (cols, rows) = (params.cols, params.rows);
    if cols < 2 || rows < 2 {
        return None;
    }
    let needed = cols * rows;

    let raw = detect_corners(img, &params.chess_config());
    let corners = suppress_duplicates(raw, params.graph.min_spacing_pix);
    if corners.len() < needed {
        debug!("only {} corners, need {}", corners.len(), needed);
        return None;
    }

    let graph = GridGraph::new(&corners, &params.graph);
    let mut components = graph.connected_components();
    components.retain(|c| c.len() >= needed);
    components.sort_by_key(|c| std::cmp::Reverse(c.len()));

    let mut best: Option<ChessboardCorners> = None;
    for component in components {
        let Some(&start) = component
            .iter()
            .max_by(|&&a, &&b| corners[a].strength.total_cmp(&corners[b].strength))
        else {
            continue;
        };
        let cells = graph.assign_grid_coordinates(start);
        let Some(window) = best_window(&cells, &corners, cols, rows) else {
            continue;
        };
        if best.as_ref().is_some_and(|b| b.strength >= window.strength) {
            continue;
        }

        let mut points = Vec::with_capacity(needed);
        for r in 0..rows {
            for c in 0..cols {
                let idx = cells[&cell_at(&window, c, r)];
                points.push(corners[idx].position);
            }
        }
        canonicalize(&mut points, cols, rows);
        best = Some(ChessboardCorners {
            cols,
            rows,
            points,
            strength: window.strength,
        });
    }

    match &best {
        Some(board) => info!(
            "chessboard {}x{} found, strength {:.1}",
            cols, rows, board.strength
        ),
        None => debug!("no complete {}x{} chessboard", cols, rows),
    }
    best
}
