//! HTTP surface for the Prescripto notification service.
//!
//! Endpoints:
//! - GET  /health — liveness and whether email credentials are configured
//! - POST /api/notifications/email — queue a transactional email
//! - GET  /api/notifications/stats — delivery counters

pub mod routes;
pub mod state;
