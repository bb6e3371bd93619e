use {
    super::*,
    sha3::{Digest, Keccak256},
};

const ROUNDS: usize = 4;

/// The proof-of-work function. Must be a pure function of the scratchpad and the blob.
pub trait Hasher: Send + Sync {
    fn hash(&self, scratchpad: &[u64], blob: &[u8]) -> [u8; 32];
}

/// Keccak-256 over the blob, then a few rounds that fold in scratchpad words picked by the
/// current state.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildKeccak;

impl Hasher for WildKeccak {
    fn hash(&self, scratchpad: &[u64], blob: &[u8]) -> [u8; 32] {
        let mut state = [0; 32];
        state.copy_from_slice(&Keccak256::digest(blob));

        if scratchpad.is_empty() {
            return state;
        }

        let len = scratchpad.len() as u64;

        for _ in 0..ROUNDS {
            let mut round = Keccak256::new();
            round.update(state);

            for lane in state.chunks_exact(8) {
                let index = LittleEndian::read_u64(lane) % len;
                round.update(scratchpad[index as usize].to_le_bytes());
            }

            state.copy_from_slice(&round.finalize());
        }

        state
    }
}
