//! Drift equations and the registry that resolves them by name
//!
//! Each solver describes itself with a canonical name and a list of aliases;
//! the registry builds its lookup table from that metadata so configuration
//! files and the command line share one resolution path.

use crate::error::{BeamError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Longitudinal drift equation
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Solver {
    /// `dt += T eta_0 dE / (beta^2 E)`
    #[default]
    Simple,
    /// Exact path-length expression with up to three slip-factor orders
    Full,
}

impl Solver {
    pub const ALL: [Solver; 2] = [Solver::Simple, Solver::Full];

    pub fn name(&self) -> &'static str {
        match self {
            Solver::Simple => "simple",
            Solver::Full => "full",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Solver::Simple => &["linear", "first_order"],
            Solver::Full => &["exact", "exact_drift"],
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        SolverRegistry::default().create(name)
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name and alias lookup for the available solvers
#[derive(Clone, Debug)]
pub struct SolverRegistry {
    solvers: HashMap<String, Solver>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self {
            solvers: HashMap::new(),
        }
    }

    pub fn with_standard_solvers(mut self) -> Self {
        for solver in Solver::ALL {
            self.register(solver);
        }
        self
    }

    pub fn register(&mut self, solver: Solver) {
        self.solvers.insert(solver.name().to_string(), solver);
        for alias in solver.aliases() {
            self.solvers.insert(alias.to_string(), solver);
        }
    }

    /// Resolve a name or alias, case-insensitively
    pub fn create(&self, name: &str) -> Result<Solver> {
        let key = name.trim().to_ascii_lowercase();
        self.solvers.get(&key).copied().ok_or_else(|| {
            let alias_names: Vec<String> = self.list_aliases().into_iter().map(|(a, _)| a).collect();
            BeamError::UnknownSolver(format!(
                "Unknown solver: '{}'. Available solvers: {}. Aliases: {}",
                name,
                self.list_available().join(", "),
                alias_names.join(", ")
            ))
        })
    }

    pub fn list_available(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .solvers
            .iter()
            .filter(|(key, solver)| key.as_str() == solver.name())
            .map(|(key, _)| key.clone())
            .collect();
        names.sort();
        names
    }

    /// `(alias, canonical name)` pairs sorted by alias
    pub fn list_aliases(&self) -> Vec<(String, String)> {
        let mut aliases: Vec<(String, String)> = self
            .solvers
            .iter()
            .filter(|(key, solver)| key.as_str() != solver.name())
            .map(|(key, solver)| (key.clone(), solver.name().to_string()))
            .collect();
        aliases.sort_by(|a, b| a.0.cmp(&b.0));
        aliases
    }
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::new().with_standard_solvers()
    }
}
