//! # workq-dispatch
//!
//! Concurrent job-dispatch client for a remote worker cluster.
//!
//! Jobs go in through an [`engine::Inbox`], a fixed pool of execution units
//! sends them to the cluster (one per `GET`, or several per `POST`), and
//! finished jobs come back on an [`engine::Outbox`]. Failures stay in-band:
//! a job that could not be completed reports `succeeded() == false`.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod telemetry;
