// Cadence Infrastructure - System Adapters
// Implements: LoopAction for external commands

pub mod command_action;

pub use command_action::{CommandAction, CommandSpec};
