//! Histogram kernels.
//!
//! The counting histogram is a two-phase reduction: every worker counts its
//! own tile of particles into a private array, and once all tiles are done
//! the slice range is split into disjoint tiles that each worker sums over
//! all private arrays. No counter is ever shared, so the result does not
//! depend on the worker count.

use rayon::prelude::*;

/// Count alive particles into `n_slices` equal bins over `[cut_left, cut_right]`.
///
/// A particle exactly at `cut_right` lands in the last bin. Particles outside
/// the range or with `id == 0` are skipped. An empty or non-finite range
/// gives all-zero counts.
pub fn histogram(
    dt: &[f64],
    id: &[usize],
    cut_left: f64,
    cut_right: f64,
    n_slices: usize,
    n_workers: usize,
) -> Vec<f64> {
    if n_slices == 0 {
        return Vec::new();
    }
    if !(cut_right > cut_left && (cut_right - cut_left).is_finite()) {
        return vec![0.0; n_slices];
    }
    let n_workers = n_workers.max(1);
    let inv_bin_width = n_slices as f64 / (cut_right - cut_left);
    let last = n_slices - 1;

    let particle_tile = dt.len().div_ceil(n_workers).max(1);
    let private: Vec<Vec<u64>> = dt
        .par_chunks(particle_tile)
        .zip(id.par_chunks(particle_tile))
        .map(|(dt, id)| {
            let mut local = vec![0u64; n_slices];
            for (&t, &pid) in dt.iter().zip(id) {
                if pid == 0 || !(t >= cut_left && t <= cut_right) {
                    continue;
                }
                let bin = (((t - cut_left) * inv_bin_width) as usize).min(last);
                local[bin] += 1;
            }
            local
        })
        .collect();

    let slice_tile = n_slices.div_ceil(n_workers).max(1);
    let mut counts = vec![0.0; n_slices];
    counts
        .par_chunks_mut(slice_tile)
        .enumerate()
        .for_each(|(tile, out)| {
            let start = tile * slice_tile;
            for (k, slot) in out.iter_mut().enumerate() {
                let total: u64 = private.iter().map(|p| p[start + k]).sum();
                *slot = total as f64;
            }
        });
    counts
}

/// Cloud-in-cell histogram: each particle is split linearly between the two
/// nearest bin centres. Particles outside the first and last centre are
/// skipped.
pub fn smooth_histogram(dt: &[f64], id: &[usize], bin_centers: &[f64]) -> Vec<f64> {
    let n = bin_centers.len();
    let mut out = vec![0.0; n];
    if n < 2 {
        return out;
    }
    let first = bin_centers[0];
    let last = bin_centers[n - 1];
    if !(last > first && (last - first).is_finite()) {
        return out;
    }
    let inv_bin_width = (n - 1) as f64 / (last - first);

    for (&t, &pid) in dt.iter().zip(id) {
        if pid == 0 || !(t >= first && t <= last) {
            continue;
        }
        let position = (t - first) * inv_bin_width;
        let lower = (position as usize).min(n - 2);
        let frac = position - lower as f64;
        out[lower] += 1.0 - frac;
        out[lower + 1] += frac;
    }
    out
}
