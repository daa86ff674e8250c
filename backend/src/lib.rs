//! Backend library for the finance advisor.
//!
//! Layering follows domain-driven lines: `storage` owns persistence,
//! `domain` owns business rules (auth, transactions, the gamification
//! engine, AI advice), and `rest` exposes everything over axum routes.

pub mod config;
pub mod error;

pub mod domain;
pub mod rest;
pub mod storage;
