//! Acctest Sim - in-memory control plane and provisioning engine
//!
//! A test double for exercising the harness without a live cloud:
//! - [`SimulatedCloud`] stores resources and serves reads like the real API
//! - [`SimulatedEngine`] applies, plans, imports and destroys the
//!   configuration subset the template builder emits
//! - [`FaultPlan`] injects the failures the harness must detect: dropped
//!   creates, leaked deletes, lagging, stale and transient reads, failing
//!   applies and slow destroys
//!
//! # Example
//!
//! ```rust,ignore
//! use acctest_sim::{FaultPlan, SimulatedCloud, SimulatedEngineFactory};
//!
//! let cloud = SimulatedCloud::with_faults(FaultPlan::none().leak_deletes("azurerm_batch_application"));
//! let factory = SimulatedEngineFactory::new(cloud);
//! ```

#![warn(unreachable_pub)]

pub mod cloud;
pub mod engine;
pub mod fault;
pub mod parser;

pub use cloud::{CloudResource, ResourceSchema, SimulatedClient, SimulatedCloud};
pub use engine::{SimulatedEngine, SimulatedEngineFactory};
pub use fault::FaultPlan;
pub use parser::{parse, Expr, ParseError, Reference, ResourceDecl, Segment};
