use rayon::prelude::*;

/// Energy kick from a voltage sampled on `bin_centers`.
///
/// Each particle gets the linear interpolation of `voltage` at its `dt`
/// (zero outside `[first centre, last centre]`), plus `acceleration_kick`.
/// `voltage` must already include the particle charge.
pub fn linear_interp_kick(
    dt: &[f64],
    de: &mut [f64],
    voltage: &[f64],
    bin_centers: &[f64],
    acceleration_kick: f64,
) {
    let n = bin_centers.len().min(voltage.len());
    if n < 2 {
        if acceleration_kick != 0.0 {
            de.par_iter_mut().for_each(|e| *e += acceleration_kick);
        }
        return;
    }
    let first = bin_centers[0];
    let last = bin_centers[n - 1];
    let inv_bin_width = (n - 1) as f64 / (last - first);
    let slope: Vec<f64> = voltage[..n]
        .windows(2)
        .map(|w| (w[1] - w[0]) * inv_bin_width)
        .collect();

    de.par_iter_mut().zip(dt.par_iter()).for_each(|(e, &t)| {
        if t >= first && t <= last {
            let bin = (((t - first) * inv_bin_width) as usize).min(n - 2);
            *e += voltage[bin] + (t - bin_centers[bin]) * slope[bin];
        }
        *e += acceleration_kick;
    });
}
