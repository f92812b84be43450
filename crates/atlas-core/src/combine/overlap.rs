//! Block-energy overlap between selected adapters.
//!
//! Each adapter's energy per block is `|weight| * |strength|`. Normalizing by
//! the total gives a distribution over blocks, and the dot product of two
//! distributions measures how much the adapters compete for the same blocks.
//! Same-role pairs above the threshold are reported, and a role-budgeted
//! strength suggestion is damped by the worst same-role overlap.

use crate::artifact::CategoryCode;
use crate::error::{AtlasError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compositional role an adapter plays, in budget priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Character,
    Style,
    Clothing,
    Environment,
    Utility,
    Other,
}

impl Role {
    pub const HIERARCHY: [Role; 6] = [
        Role::Character,
        Role::Style,
        Role::Clothing,
        Role::Environment,
        Role::Utility,
        Role::Other,
    ];

    /// Fixed share of the total requested strength this role may claim.
    pub fn budget(&self) -> f64 {
        match self {
            Role::Character => 0.35,
            Role::Style => 0.25,
            Role::Clothing => 0.15,
            Role::Environment => 0.10,
            Role::Utility => 0.08,
            Role::Other => 0.07,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Character => "character",
            Role::Style => "style",
            Role::Clothing => "clothing",
            Role::Environment => "environment",
            Role::Utility => "utility",
            Role::Other => "other",
        }
    }

    /// Canonicalize a free-form role label. Pose and action map to utility;
    /// anything unrecognized is `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "character" => Role::Character,
            "style" => Role::Style,
            "clothing" => Role::Clothing,
            "environment" => Role::Environment,
            "utility" | "pose" | "action" => Role::Utility,
            _ => Role::Other,
        }
    }

    /// Role implied by the library category folder.
    pub fn for_category(category: Option<CategoryCode>) -> Self {
        match category {
            Some(CategoryCode::Ppl | CategoryCode::Cht | CategoryCode::Bdy) => Role::Character,
            Some(CategoryCode::Stl) => Role::Style,
            Some(CategoryCode::Clt) => Role::Clothing,
            Some(CategoryCode::Nat | CategoryCode::Bld) => Role::Environment,
            Some(CategoryCode::Utl | CategoryCode::Act) => Role::Utility,
            Some(CategoryCode::Anm | CategoryCode::Mcv) | None => Role::Other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One adapter as seen by the overlap analysis.
#[derive(Debug, Clone, Copy)]
pub struct EnergyInput<'a> {
    pub stable_id: &'a str,
    pub role: Role,
    pub block_weights: &'a [f64],
    /// Requested model strength before taming.
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyMetrics {
    pub stable_id: String,
    pub role: Role,
    pub strength: f64,
    pub energy_blocks: Vec<f64>,
    pub total_energy: f64,
    /// `energy_blocks / total_energy`, or all zeros when there is no energy.
    pub normalized: Vec<f64>,
}

pub fn energy_metrics(input: &EnergyInput<'_>) -> EnergyMetrics {
    let strength = input.strength.abs();
    let energy_blocks: Vec<f64> = input
        .block_weights
        .iter()
        .map(|w| w.abs() * strength)
        .collect();
    let total_energy: f64 = energy_blocks.iter().sum();
    let normalized = if total_energy == 0.0 {
        vec![0.0; energy_blocks.len()]
    } else {
        energy_blocks.iter().map(|e| e / total_energy).collect()
    };

    EnergyMetrics {
        stable_id: input.stable_id.to_string(),
        role: input.role,
        strength: input.strength,
        energy_blocks,
        total_energy,
        normalized,
    }
}

pub fn dot_overlap(left: &[f64], right: &[f64]) -> Result<f64> {
    if left.len() != right.len() {
        return Err(AtlasError::validation(
            "block_weights",
            format!(
                "energy vectors differ in length ({} vs {})",
                left.len(),
                right.len()
            ),
        ));
    }
    Ok(left.iter().zip(right).map(|(a, b)| a * b).sum())
}

/// Symmetric pairwise overlap, indexed like the metrics it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapMatrix {
    values: Vec<Vec<f64>>,
}

impl OverlapMatrix {
    pub fn build(metrics: &[EnergyMetrics]) -> Result<Self> {
        let n = metrics.len();
        let mut values = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let overlap = dot_overlap(&metrics[i].normalized, &metrics[j].normalized)?;
                values[i][j] = overlap;
                values[j][i] = overlap;
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Highest overlap between `i` and any other member of its role.
    pub fn max_role_overlap(&self, metrics: &[EnergyMetrics], i: usize) -> f64 {
        (0..metrics.len())
            .filter(|&j| j != i && metrics[j].role == metrics[i].role)
            .map(|j| self.get(i, j))
            .fold(0.0, f64::max)
    }
}

/// Advisory strength for one adapter under role budgets and overlap damping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAllocation {
    pub stable_id: String,
    pub role: Role,
    pub total_energy: f64,
    pub max_role_overlap: f64,
    /// Multiplier applied for overlap; 1.0 when under the threshold.
    pub damping: f64,
    /// Signed like the requested strength.
    pub suggested_strength: f64,
}

/// Split each role's budget across its members by energy, then damp members
/// that overlap a same-role peer above `threshold`.
///
/// A role's allocatable strength is `min(budget * total_requested, role_demand)`
/// where `total_requested` is the sum of absolute requested strengths.
pub fn allocate_role_budget(
    metrics: &[EnergyMetrics],
    matrix: &OverlapMatrix,
    threshold: f64,
) -> Vec<RoleAllocation> {
    let total_requested: f64 = metrics.iter().map(|m| m.strength.abs()).sum();

    let mut base = vec![0.0; metrics.len()];
    if total_requested > 0.0 {
        for role in Role::HIERARCHY {
            let members: Vec<usize> = (0..metrics.len())
                .filter(|&i| metrics[i].role == role)
                .collect();
            let role_energy: f64 = members.iter().map(|&i| metrics[i].total_energy).sum();
            if members.is_empty() || role_energy == 0.0 {
                continue;
            }

            let role_demand: f64 = members.iter().map(|&i| metrics[i].strength.abs()).sum();
            let allocatable = (role.budget() * total_requested).min(role_demand);
            for &i in &members {
                base[i] = allocatable * (metrics[i].total_energy / role_energy);
            }
        }
    }

    metrics
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let max_role_overlap = matrix.max_role_overlap(metrics, i);
            let damping = if max_role_overlap > threshold {
                threshold / max_role_overlap
            } else {
                1.0
            };
            let sign = if m.strength < 0.0 { -1.0 } else { 1.0 };
            RoleAllocation {
                stable_id: m.stable_id.clone(),
                role: m.role,
                total_energy: m.total_energy,
                max_role_overlap,
                damping,
                suggested_strength: base[i] * damping * sign,
            }
        })
        .collect()
}

/// One warning per same-role pair whose overlap exceeds `threshold`.
pub fn overlap_warnings(
    metrics: &[EnergyMetrics],
    matrix: &OverlapMatrix,
    threshold: f64,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for i in 0..metrics.len() {
        for j in (i + 1)..metrics.len() {
            if metrics[i].role != metrics[j].role {
                continue;
            }
            let overlap = matrix.get(i, j);
            if overlap > threshold {
                warnings.push(format!(
                    "{} and {} ({}) concentrate on the same blocks (overlap {:.4} > {})",
                    metrics[i].stable_id, metrics[j].stable_id, metrics[i].role, overlap, threshold
                ));
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(id: &str, role: Role, weights: &[f64], strength: f64) -> EnergyMetrics {
        energy_metrics(&EnergyInput {
            stable_id: id,
            role,
            block_weights: weights,
            strength,
        })
    }

    #[test]
    fn test_energy_and_normalization() {
        let m = metrics("A", Role::Character, &[-1.0, 0.5, 0.0], 2.0);
        assert_eq!(m.energy_blocks, vec![2.0, 1.0, 0.0]);
        assert_eq!(m.total_energy, 3.0);
        assert_eq!(m.normalized, vec![2.0 / 3.0, 1.0 / 3.0, 0.0]);

        let silent = metrics("Z", Role::Other, &[0.3, 0.3], 0.0);
        assert_eq!(silent.total_energy, 0.0);
        assert_eq!(silent.normalized, vec![0.0, 0.0]);
    }

    #[test]
    fn test_overlap_matrix_is_symmetric() {
        let all = [
            metrics("A", Role::Style, &[1.0, 1.0], 1.0),
            metrics("B", Role::Style, &[1.0, 3.0], 1.0),
        ];
        let matrix = OverlapMatrix::build(&all).unwrap();

        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.get(0, 1), matrix.get(1, 0));
        assert_eq!(matrix.get(0, 0), 0.5);
        assert_eq!(matrix.get(1, 1), 0.625);
        assert_eq!(matrix.get(0, 1), 0.5);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        assert!(dot_overlap(&[1.0], &[0.5, 0.5]).is_err());
        let all = [
            metrics("A", Role::Style, &[1.0], 1.0),
            metrics("B", Role::Style, &[1.0, 1.0], 1.0),
        ];
        assert!(OverlapMatrix::build(&all).is_err());
    }

    #[test]
    fn test_role_budgets_cap_before_sharing() {
        let all = [
            metrics("CHAR", Role::Character, &[1.0, 1.0], 1.0),
            metrics("STYL", Role::Style, &[1.0, 1.0], 1.0),
        ];
        let matrix = OverlapMatrix::build(&all).unwrap();
        let allocated = allocate_role_budget(&all, &matrix, 0.85);

        // Total requested 2.0: character 0.35 * 2.0, style 0.25 * 2.0.
        assert_eq!(allocated[0].suggested_strength, 0.7);
        assert_eq!(allocated[1].suggested_strength, 0.5);
        assert!(allocated.iter().all(|a| a.damping == 1.0));
    }

    #[test]
    fn test_same_role_overlap_is_damped_and_reported() {
        let all = [
            metrics("A", Role::Clothing, &[0.0, 1.0], 1.0),
            metrics("B", Role::Clothing, &[0.0, 1.0], -1.0),
            metrics("C", Role::Style, &[0.0, 1.0], 1.0),
        ];
        let matrix = OverlapMatrix::build(&all).unwrap();
        let allocated = allocate_role_budget(&all, &matrix, 0.85);

        // Clothing cap 0.15 * 3.0 split evenly, then damped by 0.85 / 1.0.
        assert!((allocated[0].suggested_strength - 0.225 * 0.85).abs() < 1e-12);
        assert!((allocated[1].suggested_strength + 0.225 * 0.85).abs() < 1e-12);
        assert_eq!(allocated[0].max_role_overlap, 1.0);
        // Overlap with a different role never damps.
        assert_eq!(allocated[2].damping, 1.0);

        let warnings = overlap_warnings(&all, &matrix, 0.85);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("A and B (clothing)"));
    }

    #[test]
    fn test_identical_inputs_allocate_identically() {
        let all = [
            metrics("A", Role::Clothing, &[0.2, 0.8], 1.0),
            metrics("B", Role::Clothing, &[0.2, 0.8], 1.0),
        ];
        let matrix = OverlapMatrix::build(&all).unwrap();
        let first = allocate_role_budget(&all, &matrix, 0.85);
        let second = allocate_role_budget(&all, &matrix, 0.85);

        assert_eq!(first, second);
        assert_eq!(first[0].suggested_strength, first[1].suggested_strength);
    }

    #[test]
    fn test_zero_requested_strength_allocates_nothing() {
        let all = [metrics("A", Role::Character, &[1.0, 0.0], 0.0)];
        let matrix = OverlapMatrix::build(&all).unwrap();
        assert_eq!(allocate_role_budget(&all, &matrix, 0.85)[0].suggested_strength, 0.0);
    }

    #[test]
    fn test_role_labels_and_categories() {
        assert_eq!(Role::from_label(" Pose "), Role::Utility);
        assert_eq!(Role::from_label("action"), Role::Utility);
        assert_eq!(Role::from_label(""), Role::Other);
        assert_eq!(Role::from_label("lighting"), Role::Other);
        assert_eq!(Role::for_category(Some(CategoryCode::Ppl)), Role::Character);
        assert_eq!(Role::for_category(Some(CategoryCode::Clt)), Role::Clothing);
        assert_eq!(Role::for_category(Some(CategoryCode::Act)), Role::Utility);
        assert_eq!(Role::for_category(None), Role::Other);
    }
}
