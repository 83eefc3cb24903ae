//! Chronologically sortable keys for appended list entries.
//!
//! 20 characters: 8 encode the millisecond clock, 12 are random. Within
//! one millisecond the random part is incremented so ids from the same
//! generator still sort in creation order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

pub struct PushIdGenerator {
    last_time: i64,
    last_rand: [u8; 12],
    rng: StdRng,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            last_time: -1,
            last_rand: [0; 12],
            rng,
        }
    }

    pub fn next_id(&mut self, now_ms: i64) -> String {
        let now_ms = now_ms.max(0);
        let same_millisecond = now_ms == self.last_time;
        self.last_time = now_ms;

        let mut time_chars = [0u8; 8];
        let mut remaining = now_ms;
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }

        if same_millisecond {
            for digit in self.last_rand.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            for digit in self.last_rand.iter_mut() {
                *digit = self.rng.gen_range(0..64);
            }
        }

        let mut id = String::with_capacity(20);
        id.extend(time_chars.iter().map(|&c| c as char));
        id.extend(self.last_rand.iter().map(|&d| PUSH_CHARS[d as usize] as char));
        id
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
