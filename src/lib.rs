//! CVMS connector trigger
//!
//! Resolves a project on the central vulnerability management platform,
//! finds (or creates) its tool connectors, starts their analysis jobs or
//! uploads a report, and optionally waits for the jobs to complete.

pub mod auth;
pub mod blackduck;
pub mod config;
pub mod connectors;
pub mod cvms;
pub mod error;
pub mod http_client;
pub mod identity;
pub mod jobs;
pub mod model;
pub mod orchestrator;
pub mod polaris;
