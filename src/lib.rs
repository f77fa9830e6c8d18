//! Salary Grading Engine
//!
//! This crate derives salary grade tables (five points per position level) from
//! a base value and compounding growth rates, and manages the scenarios that
//! produce them: drafts are calculated, compared with the live structure, and
//! applied as the single current scenario of a grading system.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod repository;
pub mod telemetry;
