pub mod bridge;
pub mod gesture;
pub mod keyboard;
pub mod vehicle;
pub mod web;
