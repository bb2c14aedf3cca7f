//! Four-point homography estimation.
//!
//! The planar PnP solver seeds its pose from the homography mapping the
//! marker's canonical plane coordinates to the detected pixel corners.
//! Points are Hartley-normalized before the solve to keep the 8x8 system
//! well conditioned at pixel scales.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Signed area of a quadrilateral (shoelace). Zero for collinear or
/// fully coincident corner sets.
pub fn quad_area(pts: &[Point2<f64>; 4]) -> f64 {
    let mut acc = 0.0;
    for i in 0..4 {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

fn normalization_transform(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        2.0_f64.sqrt() / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_corners(pts: &[Point2<f64>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= 4.0;
    cy /= 4.0;

    let mut mean_dist = 0.0;
    for p in pts {
        mean_dist += ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt();
    }
    mean_dist /= 4.0;

    let t = normalization_transform(cx, cy, mean_dist);
    let mut out = [Point2::origin(); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }
    (out, t)
}

fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let h = t_dst.try_inverse()? * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

/// Estimate `H` such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// for degenerate configurations (collinear or coincident corners make the
/// linear system singular).
pub fn homography_from_corners(
    src: &[Point2<f64>; 4],
    dst: &[Point2<f64>; 4],
) -> Option<Matrix3<f64>> {
    // Unknowns [h11..h32] with h33 = 1. Each correspondence (x,y)->(u,v)
    // contributes:
    //   h11 x + h12 y + h13 - u h31 x - u h32 y = u
    //   h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_corners(src);
    let (dst_n, t_dst) = normalize_corners(dst);

    // After normalization a proper quad has area O(1); collinear or
    // coincident corners collapse it and the solve below is meaningless
    // even when the pivots stay numerically nonzero.
    if quad_area(&src_n).abs() < 1e-9 || quad_area(&dst_n).abs() < 1e-9 {
        return None;
    }

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let hn = Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    denormalize(hn, t_src, t_dst)
}
