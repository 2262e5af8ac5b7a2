//! Tangent Core - nonlinear static analysis
//!
//! Orchestration core of a finite element engine: it advances a model
//! through load steps, iterating each step to equilibrium while every
//! element, material and node keeps its own committed and trial state.
//!
//! # Architecture
//!
//! - [`Registry`]: tagged store per object kind with enable/disable
//! - [`Domain`]: the model; lifecycle fan-outs and DOF numbering
//! - [`StatefulObject`]: the trial → commit/reset protocol
//! - [`Element`], [`UniaxialMaterial`], [`Section`]: role traits with a
//!   small reference library
//! - [`AnalysisState`]: global vectors and the assembled tangent
//! - [`ControlStrategy`]: load, displacement and arc-length control
//! - [`StaticAnalysis`]: the step driver
//!
//! # Example
//!
//! ```ignore
//! use tangent_core::*;
//! use nalgebra::Vector3;
//!
//! let mut domain = Domain::new();
//! domain.add_node(Node::new(1, Vector3::zeros(), 1)?)?;
//! domain.add_node(Node::new(2, Vector3::x(), 1)?)?;
//! let steel = Elastic::new(1, 2e5)?;
//! domain.add_element(Truss::new(1, [Tag(1), Tag(2)], &steel, 1.0)?)?;
//! domain.add_constraint(Constraint::fixed(1, Tag(1), 0))?;
//! domain.add_load(NodalLoad::new(1, Tag(2), vec![100.0]))?;
//!
//! let mut analysis = StaticAnalysis::new(domain, AnalysisConfig::default())?;
//! let report = analysis.analyze(1)?;
//! ```

pub mod algorithm;
pub mod analysis;
pub mod config;
pub mod control;
pub mod convergence;
pub mod domain;
pub mod element;
pub mod error;
pub mod integrator;
pub mod load;
pub mod material;
pub mod node;
pub mod numberer;
pub mod object;
pub mod recorder;
pub mod registry;
pub mod section;
pub mod solver;
pub mod sparse;
pub mod state;
pub mod types;

pub use algorithm::{NewtonRaphson, TangentUpdate};
pub use analysis::{AnalysisReport, StaticAnalysis, StepReport};
pub use config::{AnalysisConfig, ControlConfig, TestConfig};
pub use control::{ArcLength, ControlStrategy, DisplacementControl, LoadControl};
pub use convergence::{ConvergenceTest, Criterion, Norm};
pub use domain::Domain;
pub use element::{Element, Truss, ZeroLength};
pub use error::{status_code, Error, Result};
pub use load::{Constraint, NodalLoad};
pub use material::{Elastic, Hardening, StrainLimit, UniaxialMaterial};
pub use node::Node;
pub use numberer::{bandwidth, reverse_cuthill_mckee, Dof, DofMap, NumbererKind};
pub use object::{DomainObject, Phase, StatefulObject};
pub use recorder::{ElementRecorder, NodeRecorder, Recorder, Sample};
pub use registry::Registry;
pub use section::{Fiber, FiberSection, Section};
pub use solver::{DenseLuSolver, FaerCholeskySolver, LinearSolver, LinearSolverKind};
pub use sparse::CsrMatrix;
pub use state::AnalysisState;
pub use types::{ObjectKind, Point3, ResponseKind, Tag};
