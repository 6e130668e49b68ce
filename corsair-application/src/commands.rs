pub mod edit_commands;
pub mod intake_commands;
pub mod participants;
pub mod submit_commands;
