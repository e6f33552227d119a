pub mod checkpoints;
pub mod commands;
pub mod engine;
pub mod fs;
pub mod gate;
pub mod models;
pub mod plan;
pub mod process;
pub mod producer;
pub mod retry;
pub mod utils;
pub mod validation;

/// ASCII art logo for the stagehand CLI
pub const LOGO: &str = "\
   ┌─┐┌┬┐┌─┐┌─┐┌─┐┬ ┬┌─┐┌┐┌┌┬┐
   └─┐ │ ├─┤│ ┬├┤ ├─┤├─┤│││ ││
   └─┘ ┴ ┴ ┴└─┘└─┘┴ ┴┴ ┴┘└┘─┴┘";
