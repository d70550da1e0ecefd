pub mod rooms;
pub mod runner;
