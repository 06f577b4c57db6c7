use std::str::FromStr;

use thiserror::Error;

use crate::input::conditions::ConditionTable;
use crate::notify::Notice;

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("design formula is empty")]
    Empty,
}

impl DesignError {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            DesignError::Empty => Some(Notice::error(
                "Design formula is empty",
                "At least one design matrix column must be given a role",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Explanatory,
    Confounding,
    Cluster,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explanatory" => Ok(Role::Explanatory),
            "confounding" => Ok(Role::Confounding),
            "cluster" => Ok(Role::Cluster),
            other => Err(format!("unknown design role '{other}'")),
        }
    }
}

/// Design terms grouped by role, each group in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignFormula {
    pub explanatory: Vec<String>,
    pub confounding: Vec<String>,
    pub cluster: Vec<String>,
}

impl DesignFormula {
    pub fn terms(&self, role: Role) -> &[String] {
        match role {
            Role::Explanatory => &self.explanatory,
            Role::Confounding => &self.confounding,
            Role::Cluster => &self.cluster,
        }
    }

    /// Comma-joined wire form of one role group.
    pub fn joined(&self, role: Role) -> String {
        self.terms(role).join(",")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.explanatory
            .iter()
            .chain(&self.confounding)
            .chain(&self.cluster)
            .map(String::as_str)
    }

    /// Terms the condition table has no column for. The engine stays the
    /// authority on these, so callers only warn.
    pub fn missing_terms<'a>(&'a self, conditions: &ConditionTable) -> Vec<&'a str> {
        self.columns()
            .filter(|term| !conditions.has_column(term))
            .collect()
    }
}

/// Splits `(column, role)` pairs into role groups. Unknown roles are dropped
/// with a warning.
pub fn split_design_formula(terms: &[(String, String)]) -> Result<DesignFormula, DesignError> {
    if terms.is_empty() {
        return Err(DesignError::Empty);
    }

    let mut formula = DesignFormula::default();
    for (column, role) in terms {
        match role.parse::<Role>() {
            Ok(Role::Explanatory) => formula.explanatory.push(column.clone()),
            Ok(Role::Confounding) => formula.confounding.push(column.clone()),
            Ok(Role::Cluster) => formula.cluster.push(column.clone()),
            Err(reason) => tracing::warn!("ignoring design term '{column}': {reason}"),
        }
    }
    Ok(formula)
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/design.rs"]
mod tests;
