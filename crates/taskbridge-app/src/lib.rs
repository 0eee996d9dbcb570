pub mod cli;
pub mod composition;
pub mod daemon_process;
pub mod logging;
pub mod status;
