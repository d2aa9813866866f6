// crates/watchgate-core/src/core/condition.rs
// ============================================================================
// Module: Watchgate Condition Trees
// Description: Boolean condition trees for conditional router rules.
// Purpose: Model nested AND/OR/NOT criteria as a proper sum type with
//          save-time structural validation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Conditional router rules store one boolean condition tree. Leaves bind a
//! field to an operator and a comparison value; groups combine children with
//! AND/OR. Trees are validated once when a rule is saved (shape, depth,
//! field/operator pairing) so the evaluation hot path can interpret them
//! without re-checking structure.
//!
//! Trees are acyclic by construction: nodes own their children and no
//! back-references exist. The depth limit below bounds stack use for
//! adversarially deep rule payloads.
//!
//! Security posture: condition trees are authored through the admin surface
//! and treated as untrusted input at the save boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum supported nesting depth for condition trees.
pub const MAX_CONDITION_NESTING: usize = 32;

/// Maximum accepted length of a regex pattern in a condition value.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 512;

/// Compiled-size limit handed to the regex engine.
///
/// The regex crate guarantees linear-time matching; the size limit rejects
/// pathologically large compiled programs at validation time instead of
/// during evaluation.
pub const MAX_REGEX_COMPILED_BYTES: usize = 1 << 20;

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Comparison operator bound to a condition leaf.
///
/// # Invariants
/// - Variants are stable for serialization and rule-authoring metadata.
/// - Each evaluator family advertises the subset it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Exact equality (set equality for multi-valued fields).
    Equals,
    /// Exact inequality.
    NotEquals,
    /// Any-overlap containment.
    Contains,
    /// No-overlap containment.
    NotContains,
    /// Membership in a value list.
    In,
    /// Absence from a value list.
    NotIn,
    /// Inclusive numeric range check.
    Between,
    /// Regular-expression match.
    Regex,
}

impl ConditionOperator {
    /// Returns the stable wire label for the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Between => "between",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean combinator for condition groups.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOperator {
    /// All children must hold; an empty group is vacuously true.
    And,
    /// Any child must hold; an empty group is vacuously false.
    Or,
}

// ============================================================================
// SECTION: Condition Values
// ============================================================================

/// Inclusive numeric range with optional open bounds.
///
/// # Invariants
/// - An open bound defaults to the corresponding infinity.
/// - When both bounds are present, `min <= max` (checked at save time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRange {
    /// Inclusive lower bound; `None` means unbounded below.
    #[serde(default)]
    pub min: Option<i64>,
    /// Inclusive upper bound; `None` means unbounded above.
    #[serde(default)]
    pub max: Option<i64>,
}

impl NumberRange {
    /// Returns true when the value falls inside the range (bounds inclusive).
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Comparison value carried by a condition leaf.
///
/// # Invariants
/// - The untagged wire form distinguishes variants by JSON shape: number,
///   string, homogeneous array, or `{min,max}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// A single integer value.
    Number(i64),
    /// A single string value.
    Text(String),
    /// A list of integer values.
    NumberList(Vec<i64>),
    /// A list of string values.
    TextList(Vec<String>),
    /// An inclusive numeric range.
    Range(NumberRange),
}

impl ConditionValue {
    /// Returns the string values carried by this value, if any.
    #[must_use]
    pub fn as_text_values(&self) -> Option<Vec<&str>> {
        match self {
            Self::Text(value) => Some(vec![value.as_str()]),
            Self::TextList(values) => Some(values.iter().map(String::as_str).collect()),
            Self::Number(_) | Self::NumberList(_) | Self::Range(_) => None,
        }
    }

    /// Returns the numeric values carried by this value, if any.
    #[must_use]
    pub fn as_number_values(&self) -> Option<Vec<i64>> {
        match self {
            Self::Number(value) => Some(vec![*value]),
            Self::NumberList(values) => Some(values.clone()),
            Self::Text(_) | Self::TextList(_) | Self::Range(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Condition Nodes
// ============================================================================

/// Leaf condition binding a field to an operator and comparison value.
///
/// # Invariants
/// - `negate` inverts the leaf result exactly once, applied by the
///   interpreter after field matching (field evaluators never apply it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field key resolved to an evaluator family at interpretation time.
    pub field: String,
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Comparison value.
    pub value: ConditionValue,
    /// Invert the result of this leaf.
    #[serde(default)]
    pub negate: bool,
}

/// Composite condition combining children with a boolean operator.
///
/// # Invariants
/// - `negate` inverts the combined result exactly once, after combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    /// Boolean combinator applied over `conditions`.
    pub operator: BooleanOperator,
    /// Ordered child nodes.
    pub conditions: Vec<ConditionNode>,
    /// Invert the combined result of this group.
    #[serde(default)]
    pub negate: bool,
}

/// A node in a condition tree.
///
/// # Invariants
/// - The untagged wire form distinguishes variants by shape: groups carry a
///   `conditions` array, leaves carry a `field` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    /// Composite group node.
    Group(ConditionGroup),
    /// Leaf condition node.
    Leaf(Condition),
}

impl ConditionNode {
    /// Returns every distinct field referenced by leaves under this node.
    #[must_use]
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    /// Accumulates referenced fields depth-first, skipping duplicates.
    fn collect_fields<'tree>(&'tree self, fields: &mut Vec<&'tree str>) {
        match self {
            Self::Leaf(condition) => {
                if !fields.contains(&condition.field.as_str()) {
                    fields.push(condition.field.as_str());
                }
            }
            Self::Group(group) => {
                for child in &group.conditions {
                    child.collect_fields(fields);
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Field Catalog
// ============================================================================

/// Rule-authoring metadata describing one condition field.
///
/// # Invariants
/// - `operators` lists every operator the owning evaluator accepts for the
///   field; validation rejects pairings outside this set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field key as written in condition leaves.
    pub field: String,
    /// Operators accepted for the field.
    pub operators: Vec<ConditionOperator>,
    /// Human-readable description for the rule-authoring surface.
    pub description: String,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Structural validation errors for condition trees.
///
/// # Invariants
/// - Variants are stable for programmatic handling by the rule-save surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// Tree exceeds the supported nesting depth.
    #[error("condition tree exceeds nesting limit: depth {actual_depth} (max {max_depth})")]
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max_depth: usize,
        /// Depth at which the limit was exceeded.
        actual_depth: usize,
    },
    /// Leaf references a field no evaluator claims.
    #[error("unknown condition field: {field}")]
    UnknownField {
        /// The unresolved field key.
        field: String,
    },
    /// Leaf pairs a known field with an operator outside its allowed set.
    #[error("operator {operator} not supported for field {field}")]
    OperatorNotSupported {
        /// The field key.
        field: String,
        /// The rejected operator.
        operator: ConditionOperator,
    },
    /// Leaf field key is empty.
    #[error("condition field must not be empty")]
    EmptyField,
    /// Range bounds are inverted.
    #[error("range bounds inverted: min {min} > max {max}")]
    InvertedRange {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// Regex pattern is too long or fails to compile within limits.
    #[error("regex pattern rejected: {reason}")]
    RegexRejected {
        /// Rejection reason.
        reason: String,
    },
    /// Regex operator used with a non-string value.
    #[error("regex operator requires a string pattern for field {field}")]
    RegexRequiresText {
        /// The field key.
        field: String,
    },
}

/// Validates a condition tree against the field catalog.
///
/// Checks nesting depth, field existence, field/operator pairing, range
/// bound ordering, and regex pattern limits. Runs at rule-save time; the
/// interpreter assumes a validated tree.
///
/// # Errors
///
/// Returns [`ConditionError`] for the first structural violation found.
pub fn validate_condition_tree(
    node: &ConditionNode,
    catalog: &[FieldInfo],
) -> Result<(), ConditionError> {
    validate_node(node, catalog, 1)
}

/// Validates one node at the given depth.
fn validate_node(
    node: &ConditionNode,
    catalog: &[FieldInfo],
    depth: usize,
) -> Result<(), ConditionError> {
    if depth > MAX_CONDITION_NESTING {
        return Err(ConditionError::NestingTooDeep {
            max_depth: MAX_CONDITION_NESTING,
            actual_depth: depth,
        });
    }
    match node {
        ConditionNode::Leaf(condition) => validate_leaf(condition, catalog),
        ConditionNode::Group(group) => {
            for child in &group.conditions {
                validate_node(child, catalog, depth + 1)?;
            }
            Ok(())
        }
    }
}

/// Validates a single leaf condition.
fn validate_leaf(condition: &Condition, catalog: &[FieldInfo]) -> Result<(), ConditionError> {
    if condition.field.is_empty() {
        return Err(ConditionError::EmptyField);
    }
    let Some(info) = catalog.iter().find(|info| info.field == condition.field) else {
        return Err(ConditionError::UnknownField {
            field: condition.field.clone(),
        });
    };
    if !info.operators.contains(&condition.operator) {
        return Err(ConditionError::OperatorNotSupported {
            field: condition.field.clone(),
            operator: condition.operator,
        });
    }
    if let ConditionValue::Range(range) = &condition.value
        && let (Some(min), Some(max)) = (range.min, range.max)
        && min > max
    {
        return Err(ConditionError::InvertedRange {
            min,
            max,
        });
    }
    if condition.operator == ConditionOperator::Regex {
        let ConditionValue::Text(pattern) = &condition.value else {
            return Err(ConditionError::RegexRequiresText {
                field: condition.field.clone(),
            });
        };
        compile_guarded_regex(pattern).map_err(|reason| ConditionError::RegexRejected {
            reason,
        })?;
    }
    Ok(())
}

/// Compiles a case-insensitive regex under the pattern and size guards.
///
/// The same guard runs at save time (rejecting the rule) and at evaluation
/// time (treating the pattern as a non-match), so a pattern that slips past
/// one boundary cannot stall the other.
///
/// # Errors
///
/// Returns a rejection reason when the pattern exceeds limits or fails to
/// compile.
pub fn compile_guarded_regex(pattern: &str) -> Result<regex::Regex, String> {
    if pattern.len() > MAX_REGEX_PATTERN_LENGTH {
        return Err(format!(
            "pattern exceeds length limit: {} bytes (max {MAX_REGEX_PATTERN_LENGTH})",
            pattern.len()
        ));
    }
    regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(MAX_REGEX_COMPILED_BYTES)
        .build()
        .map_err(|err| err.to_string())
}
