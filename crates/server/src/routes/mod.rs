pub mod rooms;
pub mod run;
