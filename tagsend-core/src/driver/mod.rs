//! Chat client driver seam.
//!
//! The desktop automation library that actually types into the chat client
//! lives outside this crate. Everything here talks to it through
//! [`ChatDriver`], so changes in what the library offers stay inside one
//! adapter.

pub mod command;
pub mod dry_run;

pub use command::CommandDriver;
pub use dry_run::DryRunDriver;

use crate::settings::{DriverConfig, DriverKind};
use shared_types::FriendDetail;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to launch driver program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("driver I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("driver {action} exited with {status}: {stderr}")]
    Failed {
        action: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("driver returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("driver does not support {0}")]
    Unsupported(&'static str),
}

/// What a driver can do. Used to explain missing features instead of
/// failing on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverCapabilities {
    pub send_message: bool,
    pub friend_details: bool,
}

/// Narrow interface to the chat client.
///
/// Calls may be slow and stateful: a client that is not logged in can
/// report `Ok(false)` without further detail.
pub trait ChatDriver {
    fn name(&self) -> &str;

    fn capabilities(&self) -> DriverCapabilities;

    /// Attaches to the running chat client.
    fn connect(&mut self) -> Result<bool, DriverError>;

    /// Sends `text` to the conversation named `contact`. With `exact_match`
    /// the client must not fall back to a fuzzy search result.
    fn send_message(
        &mut self,
        contact: &str,
        text: &str,
        exact_match: bool,
    ) -> Result<bool, DriverError>;

    /// Up to `limit` friend profiles, when the driver supports it.
    fn friend_details(&mut self, _limit: Option<usize>) -> Result<Vec<FriendDetail>, DriverError> {
        Err(DriverError::Unsupported("friend details"))
    }
}

pub fn build_driver(config: &DriverConfig) -> Box<dyn ChatDriver> {
    match config.kind {
        DriverKind::DryRun => Box::new(DryRunDriver::new()),
        DriverKind::Command => Box::new(CommandDriver::new(
            config.program.clone(),
            config.args.clone(),
        )),
    }
}
