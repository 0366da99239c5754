pub mod web;

pub use web::{router, AppState};
