//! One random identity per process, stamped into every client's `User-Agent`.

use rand::RngCore;

/// `bridge_id`: a random hex string generated once per process.
#[derive(Debug, Clone)]
pub struct BridgeIdentity {
    pub bridge_id: String,
}

impl BridgeIdentity {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let bridge_id = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self { bridge_id }
    }

    /// `<configured_agent>/<bridge_id>`, the User-Agent every `ApiClient` carries.
    pub fn user_agent(&self, configured_agent: &str) -> String {
        format!("{}/{}", configured_agent, self.bridge_id)
    }
}
