use glean_core::domain::PingType;

use crate::operation::Operation;
use crate::Glean;

/// A custom ping
///
/// Creating the handle registers the ping.
#[derive(Clone)]
pub struct PingHandle {
    ping: PingType,
    glean: Glean,
}

impl PingHandle {
    pub fn new(glean: &Glean, ping: PingType) -> Self {
        glean.register_ping_type(ping.clone());
        Self {
            ping,
            glean: glean.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.ping.name
    }

    /// Collects and uploads the ping
    ///
    /// Does nothing if the ping is disabled or collection is off. `reason`
    /// is reported only if it is one of the ping's reason codes.
    pub fn submit(&self, reason: Option<&str>) {
        self.glean.launch(Operation::SubmitPing {
            name: self.ping.name.clone(),
            reason: reason.map(str::to_string),
        });
    }
}
