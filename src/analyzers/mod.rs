//! Segment derivations, aggregation and reporting.
//!
//! This module derives per-segment flows, capacity and LOS, checks them
//! against validation ranges, reduces them per direction and facility
//! type, and assembles the section reports.

pub mod aggregate;
pub mod analyzer;
pub mod capacity;
pub mod compare;
pub mod flow;
pub mod grade;
pub mod summary;
pub mod truck;
pub mod types;
pub mod utility;
pub mod validate;
