//! Application state shared across handlers

use servicebook_core::Engine;

use crate::auth::JwtVerifier;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub jwt: JwtVerifier,
}

impl AppState {
    pub fn new(engine: Engine, jwt: JwtVerifier) -> Self {
        Self { engine, jwt }
    }
}
