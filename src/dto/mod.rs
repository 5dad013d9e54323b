use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod admin;
/// Session and profile bodies.
pub mod auth;
pub mod game;
/// Health check body.
pub mod health;
pub mod validation;
/// Vote casting and lookup bodies.
pub mod vote;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
