//! Particle subsets and the revolution-frame partition used by periodic
//! tracking.

/// Which particles an update touches
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParticleSelection {
    All,
    /// Explicit indices, each at most once
    Subset(Vec<usize>),
}

impl ParticleSelection {
    pub fn len(&self, n_particles: usize) -> usize {
        match self {
            ParticleSelection::All => n_particles,
            ParticleSelection::Subset(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self, n_particles: usize) -> bool {
        self.len(n_particles) == 0
    }

    /// Run `update` on contiguous `(dt, dE)` buffers holding the selected
    /// particles. Subsets are gathered first and written back afterwards.
    pub fn apply<F>(&self, dt: &mut [f64], de: &mut [f64], update: F)
    where
        F: FnOnce(&mut [f64], &mut [f64]),
    {
        match self {
            ParticleSelection::All => update(dt, de),
            ParticleSelection::Subset(indices) => {
                if indices.is_empty() {
                    return;
                }
                let mut sub_dt: Vec<f64> = indices.iter().map(|&i| dt[i]).collect();
                let mut sub_de: Vec<f64> = indices.iter().map(|&i| de[i]).collect();
                update(&mut sub_dt, &mut sub_de);
                for (k, &i) in indices.iter().enumerate() {
                    dt[i] = sub_dt[k];
                    de[i] = sub_de[k];
                }
            }
        }
    }
}

/// Inside-frame / right-outside split of the ensemble for one turn
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePartition {
    pub inside_frame: Vec<usize>,
    pub right_outside: Vec<usize>,
    /// Particles that drifted below zero during the last turn
    pub left_outside: Vec<usize>,
}

impl FramePartition {
    /// Split on `t_rev`: `dt >= t_rev` is right-outside, everything else
    /// (including `dt < 0`) is inside the frame
    pub fn split(dt: &[f64], t_rev: f64) -> Self {
        let (right_outside, inside_frame): (Vec<usize>, Vec<usize>) =
            (0..dt.len()).partition(|&i| dt[i] >= t_rev);
        Self {
            inside_frame,
            right_outside,
            left_outside: Vec::new(),
        }
    }
}

pub(crate) fn indices_below(dt: &[f64], limit: f64) -> Vec<usize> {
    dt.iter()
        .enumerate()
        .filter(|(_, t)| **t < limit)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_gathers_and_scatters() {
        let mut dt = vec![0.0, 1.0, 2.0, 3.0];
        let mut de = vec![0.0; 4];
        let selection = ParticleSelection::Subset(vec![3, 1]);
        selection.apply(&mut dt, &mut de, |dt, de| {
            assert_eq!(dt, &[3.0, 1.0]);
            for (t, e) in dt.iter_mut().zip(de.iter_mut()) {
                *e = *t * 10.0;
                *t += 0.5;
            }
        });
        assert_eq!(dt, vec![0.0, 1.5, 2.0, 3.5]);
        assert_eq!(de, vec![0.0, 10.0, 0.0, 30.0]);
    }

    #[test]
    fn test_empty_subset_is_skipped() {
        let mut dt = vec![1.0];
        let mut de = vec![1.0];
        ParticleSelection::Subset(Vec::new()).apply(&mut dt, &mut de, |_, _| panic!("called"));
        assert!(ParticleSelection::Subset(Vec::new()).is_empty(1));
        assert_eq!(ParticleSelection::All.len(5), 5);
    }

    #[test]
    fn test_partition_boundary_is_right_outside() {
        let partition = FramePartition::split(&[-1.0, 0.0, 4.9, 5.0, 7.0], 5.0);
        assert_eq!(partition.inside_frame, vec![0, 1, 2]);
        assert_eq!(partition.right_outside, vec![3, 4]);
        assert_eq!(indices_below(&[-1.0, 0.0, -0.5], 0.0), vec![0, 2]);
    }
}
