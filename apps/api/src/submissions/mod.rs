// Candidate-facing submission flow and the admin views over stored answers.

pub mod export;
pub mod gate;
pub mod handlers;
pub mod locks;
pub mod stats;
