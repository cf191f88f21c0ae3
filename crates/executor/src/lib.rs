//! Report pipeline execution.
//!
//! This crate drives the domain defined in [`pipeline`]: fetch units with
//! bounded retry and per-attempt deadlines, the aggregate orchestrator that
//! runs units sequentially or in bounded parallel windows, and the report
//! lifecycle that sequences enhance, data, render and action phases.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The executor sequences calls between business
//! logic in the [`pipeline`] crate and the plugin ports it defines. It contains
//! no domain rules of its own and performs no I/O except through plugins.
//!
//! ## Concurrency
//!
//! Parallel windows are driven concurrently on the calling task with
//! [`futures::future::join_all`]; no unit from window *k + 1* starts before
//! every unit of window *k* has settled.

pub mod lifecycle;
pub mod orchestrator;
pub mod retry;
pub mod unit;

pub use lifecycle::{ActionOutcome, ReportError, ReportOutcome, ReportRunner};
pub use orchestrator::Orchestrator;
pub use retry::run_with_retry;
pub use unit::{FetchState, FetchUnit, UnitError};
