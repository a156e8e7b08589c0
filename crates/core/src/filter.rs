//! Stream filters
//!
//! Filters gate messages during stream fan-out: a message is handed to a
//! stream's producers only if every filter attached to the stream accepts
//! it.

use crate::config::PluginConfig;
use crate::error::ConfigError;
use crate::message::Message;
use crate::plugin::{Plugin, PluginInstance, Registrable};

/// Decides whether a message passes a stream.
pub trait Filter: Plugin {
    /// Whether the message may pass.
    fn accepts(&self, message: &Message) -> bool;
}

/// Passes all messages.
#[derive(Debug, Default)]
pub struct AllFilter;

impl Plugin for AllFilter {
    fn configure(&mut self, _conf: &mut PluginConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl Filter for AllFilter {
    fn accepts(&self, _message: &Message) -> bool {
        true
    }
}

impl Registrable for AllFilter {
    const TYPE_NAME: &'static str = "filter.all";

    fn instance() -> PluginInstance {
        PluginInstance::Filter(Box::new(AllFilter))
    }
}
