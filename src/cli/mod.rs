mod cli;

pub use cli::{Cli, Command, HistoryArgs, WatchArgs};
