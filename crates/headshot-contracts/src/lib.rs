pub mod backdrop;
pub mod commands;
pub mod events;
pub mod export;
pub mod styles;
