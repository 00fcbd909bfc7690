pub mod command;
pub mod command_update;
pub mod gesture;
pub mod hand;
