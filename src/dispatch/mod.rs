//! Dispatch core - argument vectors, subprocess execution, output capture

mod capture;
mod command;
mod dispatcher;
mod naming;

pub use capture::{ManagedCapture, Scratch};
pub use command::{CommandLine, ManagedOutput, reporting_command};
pub use dispatcher::{DEFAULT_PREVIEW_BYTES, Dispatcher, DispatcherOptions};
pub use naming::{CollisionPolicy, content_digest, output_file_name, persist_output};
