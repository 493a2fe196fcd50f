pub mod config;
pub mod error;
pub mod hashing;
pub mod scoring;
pub mod types;

pub use config::Config;
pub use error::RelayError;
pub use hashing::{hash_data, hash_phone, hash_user_data, normalize_phone, split_name};
pub use scoring::{score_lead, LeadScoreResult, ScoreLogDetails};
pub use types::*;
