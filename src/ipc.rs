//! Daemon side: control socket, input pipeline and output routing.

mod dispatch;
mod pipeline;
mod runtime;
mod server;

pub use server::{client_request, run_daemon};
