//! JSON handlers. Request parsing stays here; every rule lives in the engine.

pub mod admin;
pub mod issues;
