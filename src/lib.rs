//! Cosmogen: a staged early-universe simulation.
//!
//! The physics lives in the workspace crates ([`cosmogen_core`] for the
//! integrators, [`cosmogen_data`] for shared state, [`cosmogen_io`] for
//! persistence). This crate wires them together: [`model::universe::Universe`]
//! owns one instance of every component and drives them in lockstep, and the
//! `cosmogen` binary exposes that orchestrator on the command line.

pub mod model;

pub use model::universe::Universe;
