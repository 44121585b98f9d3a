// # Reloader Implementations

pub mod command;

pub use command::CommandReloader;
