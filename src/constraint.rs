//! The constraint protocol: the one piece of required polymorphism in this crate.
//!
//! Every constraint variant (count-range, fixed-value, or a caller's own) implements
//! [`Constraint`]. The builder never knows or cares which; it only calls `nodes`, `get_state`,
//! and `resolve`.

use enumset::{EnumSet, EnumSetType};
use std::fmt::Debug;

use crate::error::Error;
use crate::scenario::Scenario;

/// The flags a constraint can report about its relationship to a scenario.
///
/// `Satisfied` implies `Satisfiable`. `Resolved` holds iff every node the constraint references
/// is resolved. `Resolvable` requires at least one indeterminate referenced node and implies
/// `Satisfiable`. `Breakable` means some future assignment could still render the constraint
/// unsatisfiable. A constraint reporting the empty set is treated as broken: unsatisfiable and
/// unresolved.
#[derive(Debug, EnumSetType)]
pub enum ConstraintState {
    Satisfiable,
    Satisfied,
    Resolvable,
    Resolved,
    Breakable,
}

/// A set of [`ConstraintState`] flags, as returned by [`Constraint::get_state`].
pub type ConstraintStates = EnumSet<ConstraintState>;

/// A predicate over a fixed, non-empty subset of a configuration's nodes.
///
/// Implementations must be deterministic functions of the scenario they're given, and safe to
/// call from any thread (constraints are shared via `Arc` across concurrent experiments).
pub trait Constraint<N, T>: Debug + Send + Sync {
    /// The nodes this constraint references. Non-empty, constant for the constraint's lifetime.
    fn nodes(&self) -> &[N];

    /// This constraint's relationship to `scenario`, as a set of [`ConstraintState`] flags.
    fn get_state(&self, scenario: &Scenario<N, T>) -> ConstraintStates;

    /// Attempt to resolve indeterminate referenced nodes. Must not touch already-resolved nodes.
    ///
    /// Returns `Ok(true)` iff at least one node's state changed. The builder detects a
    /// constraint that returns `Ok(true)` without actually mutating the scenario (via its
    /// version counter) and reports [`Error::BadConstraint`].
    fn resolve(&self, scenario: &mut Scenario<N, T>) -> Result<bool, Error>;
}
