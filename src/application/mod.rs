mod application;
pub mod data;
mod history_view;

pub use application::{Application, ApplicationError, CONTROL_DIR};
