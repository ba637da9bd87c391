//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - ROC curve: `*`
//! - chance diagonal: `.`
//! - optional operating point at the decision threshold: `T`

use crate::eval::RocPoint;

/// Render a ROC curve on the unit square.
pub fn render_roc_plot(
    roc: &[RocPoint],
    auc: Option<f64>,
    operating_point: Option<(f64, f64)>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let mut grid = vec![vec![' '; width]; height];

    // Curve first so the diagonal only fills blanks.
    let curve: Vec<(f64, f64)> = roc.iter().map(|p| (p.fpr, p.tpr)).collect();
    draw_polyline(&mut grid, &curve, '*');
    draw_polyline(&mut grid, &[(0.0, 0.0), (1.0, 1.0)], '.');

    if let Some((fpr, tpr)) = operating_point {
        let x = map_unit(fpr, width);
        let y = height - 1 - map_unit(tpr, height);
        grid[y][x] = 'T';
    }

    let mut out = String::new();
    let auc_label = auc.map(|a| format!("{a:.3}")).unwrap_or_else(|| "n/a".to_string());
    out.push_str(&format!("ROC: AUC={auc_label} | x=FPR [0, 1] | y=TPR [0, 1]\n"));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn map_unit(v: f64, cells: usize) -> usize {
    let cells = cells.max(2);
    (v.clamp(0.0, 1.0) * (cells as f64 - 1.0)).round() as usize
}

fn draw_polyline(grid: &mut [Vec<char>], points: &[(f64, f64)], ch: char) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(fx, fy) in points {
        let x = map_unit(fx, width);
        // y=top is 1 -> row 0
        let y = height - 1 - map_unit(fy, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, y, ch);
        } else if grid[y][x] == ' ' {
            grid[y][x] = ch;
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
