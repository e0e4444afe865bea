//! Small numerical helpers shared by the profile, impedance and tracker modules

/// `n` evenly spaced samples from `start` to `end`, both endpoints exact
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            out[n - 1] = end;
            out
        }
    }
}

/// Trapezoid rule on a uniform grid
pub fn trapezoid(y: &[f64], dx: f64) -> f64 {
    if y.len() < 2 {
        return 0.0;
    }
    let inner: f64 = y[1..y.len() - 1].iter().sum();
    dx * (inner + 0.5 * (y[0] + y[y.len() - 1]))
}

/// Cumulative trapezoid integral on a uniform grid, starting from `initial`
pub fn cum_trapezoid(y: &[f64], dx: f64, initial: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(y.len());
    if y.is_empty() {
        return out;
    }
    let mut acc = initial;
    out.push(acc);
    for pair in y.windows(2) {
        acc += 0.5 * dx * (pair[0] + pair[1]);
        out.push(acc);
    }
    out
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be increasing. Points before `xp[0]` take `left`, points after
/// the last sample take `right`.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64], left: f64, right: f64) -> Vec<f64> {
    x.iter().map(|&xi| interp_one(xi, xp, fp, left, right)).collect()
}

pub fn interp_one(x: f64, xp: &[f64], fp: &[f64], left: f64, right: f64) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return left;
    }
    if x < xp[0] {
        return left;
    }
    if x > xp[n - 1] {
        return right;
    }
    if n == 1 || x == xp[n - 1] {
        return fp[n - 1];
    }
    // first index with xp[k] > x, so xp[k - 1] <= x < xp[k]
    let k = xp[..n].partition_point(|&v| v <= x).clamp(1, n - 1);
    let (x0, x1) = (xp[k - 1], xp[k]);
    let (y0, y1) = (fp[k - 1], fp[k]);
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Full linear convolution, `a.len() + b.len() - 1` samples
pub fn convolve_full(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0.0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] += ai * bj;
        }
    }
    out
}

/// Smallest 5-smooth number (only prime factors 2, 3 and 5) that is `>= target`.
///
/// Those lengths keep the mixed-radix FFT on its fast paths.
pub fn next_regular(target: usize) -> usize {
    if target <= 6 {
        return target.max(1);
    }
    if target.is_power_of_two() {
        return target;
    }

    let mut best = usize::MAX;
    let mut p5 = 1usize;
    while p5 < target {
        let mut p35 = p5;
        while p35 < target {
            let quotient = target.div_ceil(p35);
            let candidate = quotient.next_power_of_two() * p35;
            if candidate == target {
                return candidate;
            }
            best = best.min(candidate);
            p35 *= 3;
            if p35 == target {
                return p35;
            }
        }
        best = best.min(p35);
        p5 *= 5;
        if p5 == target {
            return p5;
        }
    }
    best.min(p5)
}

/// Index of the first maximum, `None` for an empty slice
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Second-order central differences, first-order at the ends
pub fn gradient(y: &[f64], dx: f64) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let mut out = vec![0.0; n];
    out[0] = (y[1] - y[0]) / dx;
    out[n - 1] = (y[n - 1] - y[n - 2]) / dx;
    for i in 1..n - 1 {
        out[i] = (y[i + 1] - y[i - 1]) / (2.0 * dx);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints_exact() {
        let v = linspace(-1e-9, 1e-9, 11);
        assert_eq!(v.len(), 11);
        assert_eq!(v[0], -1e-9);
        assert_eq!(v[10], 1e-9);
        assert!(v.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_trapezoid_of_line() {
        // integral of x over [0, 1]
        let y = linspace(0.0, 1.0, 101);
        assert!((trapezoid(&y, 0.01) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cum_trapezoid_ends_at_total() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let cum = cum_trapezoid(&y, 0.5, 0.0);
        assert_eq!(cum.len(), 4);
        assert_eq!(cum[0], 0.0);
        assert!((cum[3] - trapezoid(&y, 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_interp_inside_and_outside() {
        let xp = [0.0, 1.0, 2.0];
        let fp = [0.0, 10.0, 30.0];
        let out = interp(&[-1.0, 0.5, 1.5, 2.0, 3.0], &xp, &fp, -5.0, 99.0);
        assert_eq!(out, vec![-5.0, 5.0, 20.0, 30.0, 99.0]);
    }

    #[test]
    fn test_convolve_full_small() {
        let out = convolve_full(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]);
        assert_eq!(out, vec![0.0, 1.0, 2.5, 4.0, 1.5]);
    }

    #[test]
    fn test_next_regular_values() {
        let cases = [
            (1, 1),
            (6, 6),
            (7, 8),
            (8, 8),
            (11, 12),
            (17, 18),
            (97, 100),
            (125, 125),
            (1001, 1024),
            (1025, 1080),
        ];
        for (target, expected) in cases {
            assert_eq!(next_regular(target), expected, "next_regular({target})");
        }
    }

    #[test]
    fn test_next_regular_is_smooth_and_minimal() {
        fn smooth(mut n: usize) -> bool {
            for p in [2, 3, 5] {
                while n % p == 0 {
                    n /= p;
                }
            }
            n == 1
        }
        for target in 1..2000 {
            let r = next_regular(target);
            assert!(r >= target);
            assert!(smooth(r), "{r} is not 5-smooth");
            assert!((target..r).all(|k| !smooth(k)), "{r} is not minimal for {target}");
        }
    }

    #[test]
    fn test_argmax_first_of_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_gradient_linear() {
        let g = gradient(&[0.0, 2.0, 4.0, 6.0], 2.0);
        assert_eq!(g, vec![1.0, 1.0, 1.0, 1.0]);
    }
}
