//! Deployment identifier generation.

use rand::Rng;

const ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_LENGTH: usize = 5;

/// Generate a deployment identifier: the configured prefix followed by
/// five random uppercase alphanumerics, e.g. `BuildLab-RX40Q`.
pub fn generate_deployment_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_LENGTH)
        .map(|_| ID_CHARS[rng.gen_range(0..ID_CHARS.len())] as char)
        .collect();
    format!("{}{}", prefix, suffix)
}
