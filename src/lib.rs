pub mod board;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod fen;
pub mod game_state;
pub mod logging;
pub mod moves;
pub mod server;
