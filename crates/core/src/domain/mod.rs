pub mod leave;
pub mod sheet;
pub mod thread;
pub mod uipath;
pub mod user;
