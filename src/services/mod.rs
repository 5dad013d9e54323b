/// Media references attached to game sides.
pub mod asset_attachment;
/// OpenAPI documentation generation.
pub mod documentation;
/// Publish, list and delete game records.
pub mod game_repository;
/// Health check service.
pub mod health_service;
/// Typed validation of bulk uploads.
pub mod schema_validator;
/// Storage connection supervisor with degraded mode.
pub mod storage_supervisor;
/// One-vote-per-game ledger and tallies.
pub mod vote_ledger;
