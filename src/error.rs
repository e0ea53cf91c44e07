//! The error taxonomy for the engine. Every fallible operation in this crate returns
//! `Result<_, Error>`; there is no panicking path for caller misuse or constraint misbehavior.

use std::fmt;

/// Why a constraint was rejected as badly behaved.
///
/// A constraint is only ever reported bad for one of these three reasons: it was added with
/// no nodes, it returned an error from `resolve`, or it claimed to have changed something that
/// it didn't (detected via [`Scenario`](crate::scenario::Scenario)'s version counter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadConstraintReason {
    /// The constraint was added with an empty node list.
    ConstraintForEmptySetOfNodes,
    /// `resolve` returned an error instead of completing normally.
    ConstraintThrewUnexpectedException(String),
    /// `resolve` returned `Ok(true)` but the scenario's version did not change.
    ConstraintResolveReturnedTrueWithNoChanges,
}

impl fmt::Display for BadConstraintReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BadConstraintReason::ConstraintForEmptySetOfNodes => {
                write!(f, "constraint references no nodes")
            }
            BadConstraintReason::ConstraintThrewUnexpectedException(msg) => {
                write!(f, "constraint resolve failed: {msg}")
            }
            BadConstraintReason::ConstraintResolveReturnedTrueWithNoChanges => {
                write!(f, "constraint claimed to resolve a node but changed nothing")
            }
        }
    }
}

/// Everything that can go wrong while building, propagating, or analyzing a selection problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `Configuration::new` was given no nodes.
    #[error("configuration must have at least one node")]
    EmptyNodeList,

    /// `Configuration::new` was given the same node identity twice.
    #[error("duplicate node in configuration")]
    DuplicateNode,

    /// `Configuration::new` was given fewer than two distinct resolved states.
    #[error("configuration must have at least two resolved states")]
    InsufficientStateDomain,

    /// A constraint referenced a node that isn't part of the configuration.
    #[error("constraint references a node that isn't in the configuration")]
    KeyNotFound,

    /// Attempted to `set` a node that already has a resolved value.
    #[error("node is already set")]
    NodeAlreadySet,

    /// `copy_from` between two scenarios whose node counts disagree (different configurations).
    #[error("scenario node counts do not match")]
    NodeCountMismatch,

    /// A constraint misbehaved. See [`BadConstraintReason`] for the specific failure.
    #[error("constraint {constraint} is badly behaved: {reason}")]
    BadConstraint {
        /// Debug name of the offending constraint.
        constraint: String,
        /// Why it was rejected.
        reason: BadConstraintReason,
    },

    /// No single constraint's removal would restore feasibility; a combination of constraints
    /// together causes the conflict.
    #[error("no single constraint explains this conflict")]
    ComplexConflict,

    /// `commit_analysis` was called on an analysis with zero viable solutions.
    #[error("cannot commit an analysis with no viable solutions")]
    NoViableSolutions,

    /// Cooperative cancellation fired mid-operation.
    #[error("operation cancelled after considering {scenarios_considered} scenarios")]
    Cancelled {
        /// How many scenarios `enumerate_solutions` had already visited.
        scenarios_considered: u64,
    },
}

impl Error {
    pub(crate) fn bad_constraint(constraint: impl Into<String>, reason: BadConstraintReason) -> Error {
        Error::BadConstraint {
            constraint: constraint.into(),
            reason,
        }
    }
}
