//! A generic engine for node-constraint selection problems: decide, for a fixed set of node
//! identities and a shared finite state domain, which value each node should take so that every
//! applied constraint holds.
//!
//! The engine is deliberately ignorant of what a "node" or a "value" means to the caller — a
//! cell in a grid, a line item in a scheduling problem, a card in a deduction game. It knows only
//! how to propagate constraints to a fixpoint, search for complete assignments, and isolate which
//! constraint(s) make a problem infeasible.
//!
//! ## Walking through a small example
//!
//! Say we have three nodes and want exactly one of them selected, with the first one pinned to
//! `true`. First, the imports:
//!
//! ```
//! use node_constraint_selector::constraints::{SelectionCountConstraint, SetOneNodeValueConstraint};
//! use node_constraint_selector::SolutionBuilder;
//! use std::sync::Arc;
//! ```
//!
//! A `SolutionBuilder` owns both the problem's configuration and the scenario under
//! construction. `from_parts` builds both from a node list and a resolved-state domain:
//!
//! ```
//! # use node_constraint_selector::constraints::{SelectionCountConstraint, SetOneNodeValueConstraint};
//! # use node_constraint_selector::SolutionBuilder;
//! # use std::sync::Arc;
//! let nodes = ["a", "b", "c"];
//! let mut builder = SolutionBuilder::<&str, bool>::from_parts(nodes, [true, false]).unwrap();
//! ```
//!
//! Add the two constraints. `SelectionCountConstraint::exactly` is sugar for a minimum and
//! maximum that are equal; `SetOneNodeValueConstraint` pins a single node to a known fact:
//!
//! ```
//! # use node_constraint_selector::constraints::{SelectionCountConstraint, SetOneNodeValueConstraint};
//! # use node_constraint_selector::SolutionBuilder;
//! # use std::sync::Arc;
//! # let nodes = ["a", "b", "c"];
//! # let mut builder = SolutionBuilder::<&str, bool>::from_parts(nodes, [true, false]).unwrap();
//! builder
//!     .add_constraint(Arc::new(SelectionCountConstraint::exactly(nodes, 1)))
//!     .unwrap();
//! builder
//!     .add_constraint(Arc::new(SetOneNodeValueConstraint::new("a", true)))
//!     .unwrap();
//! ```
//!
//! Resolving to a fixpoint propagates the fact that `a` is selected outward: since exactly one of
//! the three may be, `b` and `c` are forced to `false`.
//!
//! ```
//! # use node_constraint_selector::cancellation::NullToken;
//! # use node_constraint_selector::constraints::{SelectionCountConstraint, SetOneNodeValueConstraint};
//! # use node_constraint_selector::SolutionBuilder;
//! # use std::sync::Arc;
//! # let nodes = ["a", "b", "c"];
//! # let mut builder = SolutionBuilder::<&str, bool>::from_parts(nodes, [true, false]).unwrap();
//! # builder.add_constraint(Arc::new(SelectionCountConstraint::exactly(nodes, 1))).unwrap();
//! # builder.add_constraint(Arc::new(SetOneNodeValueConstraint::new("a", true))).unwrap();
//! builder.resolve_partially(&NullToken).unwrap();
//!
//! assert_eq!(builder.get(&"a"), Some(&true));
//! assert_eq!(builder.get(&"b"), Some(&false));
//! assert_eq!(builder.get(&"c"), Some(&false));
//! ```
//!
//! For problems where propagation alone can't pin every node, `analyze_solutions` enumerates
//! every complete assignment and reports per-node per-value occurrence counts, and
//! `get_probable_solution` repeatedly commits the most common remaining value until the problem
//! bottoms out at free (unconstrained) nodes.
//!
//! Diagnostics are off by default; set fields on `builder.diagnostics()` (a [`Config`]) to opt
//! into `log` output for propagation steps, constraint additions, and the like.

#![allow(clippy::type_complexity)]

mod builder;
mod configuration;
mod constraint;
mod error;
mod pool;
mod scenario;

pub mod cancellation;
pub mod constraints;

pub use builder::{Config, ConflictedConstraints, SolutionBuilder, SolutionsAnalysis};
pub use configuration::{Configuration, SelectionChangedHook};
pub use constraint::{Constraint, ConstraintState, ConstraintStates};
pub use error::{BadConstraintReason, Error};
pub use scenario::{NodeIndex, Scenario};
