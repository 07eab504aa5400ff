//! Test fixtures for generating test data.

use trellis_core::ContentHash;

/// Generate deterministic test data based on a seed.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    data
}

/// Compute SHA-256 hash of data as lowercase hex.
#[allow(dead_code)]
pub fn sha256_hex(data: &[u8]) -> String {
    ContentHash::compute(data).to_hex()
}
