//! Backend-neutral description of one step's linear program.

use std::fmt;

/// Index of a variable in a [`DispatchProblem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub name: String,
    pub lower: f64,
    /// `f64::INFINITY` for an open upper bound.
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Eq,
    Le,
    Ge,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sense::Eq => "=",
            Sense::Le => "<=",
            Sense::Ge => ">=",
        })
    }
}

/// `Σ coefficient · variable  (sense)  rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn lhs(&self, values: &Assignment) -> f64 {
        self.terms.iter().map(|(v, c)| c * values.value(*v)).sum()
    }
}

/// Minimization problem handed to an [`crate::OptimizationBackend`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchProblem {
    pub step: usize,
    pub variables: Vec<VariableDef>,
    pub constraints: Vec<LinearConstraint>,
    pub objective: Vec<(VarId, f64)>,
}

impl DispatchProblem {
    pub fn new(step: usize) -> Self {
        Self {
            step,
            ..Default::default()
        }
    }

    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.variables.push(VariableDef {
            name: name.into(),
            lower,
            upper,
        });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        sense: Sense,
        rhs: f64,
    ) {
        self.constraints.push(LinearConstraint {
            name: name.into(),
            terms,
            sense,
            rhs,
        });
    }

    /// Add `coefficient · var` to the objective. Zero coefficients are dropped.
    pub fn add_objective(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.objective.push((var, coefficient));
        }
    }

    pub fn variable(&self, id: VarId) -> &VariableDef {
        &self.variables[id.0]
    }

    pub fn evaluate_objective(&self, values: &Assignment) -> f64 {
        self.objective
            .iter()
            .map(|(v, c)| c * values.value(*v))
            .sum()
    }

    /// Names of every bound or constraint `values` violates by more than `tol`.
    pub fn violations(&self, values: &Assignment, tol: f64) -> Vec<String> {
        let mut out = Vec::new();
        for (i, def) in self.variables.iter().enumerate() {
            let v = values.value(VarId(i));
            if v < def.lower - tol || v > def.upper + tol {
                out.push(format!("{} = {} outside [{}, {}]", def.name, v, def.lower, def.upper));
            }
        }
        for c in &self.constraints {
            let lhs = c.lhs(values);
            let ok = match c.sense {
                Sense::Eq => (lhs - c.rhs).abs() <= tol,
                Sense::Le => lhs <= c.rhs + tol,
                Sense::Ge => lhs >= c.rhs - tol,
            };
            if !ok {
                out.push(format!("{}: {} {} {}", c.name, lhs, c.sense, c.rhs));
            }
        }
        out
    }
}

/// Variable values returned by a backend, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<f64>,
}

impl Assignment {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Value of `var`; 0 for ids the backend did not report.
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violations_name_the_broken_rows() {
        let mut p = DispatchProblem::new(0);
        let x = p.add_variable("x", 0.0, 10.0);
        let y = p.add_variable("y", 0.0, f64::INFINITY);
        p.add_constraint("sum", vec![(x, 1.0), (y, 1.0)], Sense::Eq, 5.0);
        p.add_objective(x, 2.0);
        p.add_objective(y, 0.0);
        assert_eq!(p.objective.len(), 1);

        let good = Assignment::new(vec![2.0, 3.0]);
        assert!(p.violations(&good, 1e-9).is_empty());
        assert_eq!(p.evaluate_objective(&good), 4.0);

        let bad = Assignment::new(vec![12.0, 3.0]);
        let v = p.violations(&bad, 1e-9);
        assert_eq!(v.len(), 2);
        assert!(v[0].starts_with("x"));
        assert!(v[1].starts_with("sum"));
    }
}
