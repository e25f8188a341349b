//! Invoice code generation
//!
//! Codes go into a transfer memo typed or pasted by a human, so they are
//! short uppercase hex. Collisions are surfaced by the invoice store and the
//! caller draws again.

use rand::RngCore;

/// Source of invoice codes
pub trait CodeGenerator: Send + Sync {
    /// Produce a fresh code
    fn generate(&self) -> String;
}

/// Random bytes rendered as uppercase hex
#[derive(Debug, Clone, Copy)]
pub struct HexCodeGenerator {
    bytes: usize,
}

impl HexCodeGenerator {
    /// Generator producing `bytes` random bytes (`2 * bytes` characters)
    pub fn new(bytes: usize) -> Self {
        Self {
            bytes: bytes.max(1),
        }
    }
}

impl Default for HexCodeGenerator {
    fn default() -> Self {
        Self::new(3)
    }
}

impl CodeGenerator for HexCodeGenerator {
    fn generate(&self) -> String {
        let mut buf = vec![0u8; self.bytes];
        rand::thread_rng().fill_bytes(&mut buf);
        buf.iter().map(|b| format!("{:02X}", b)).collect()
    }
}
