//! Leader/pair enumeration: two sliding windows advanced base by base,
//! each resetting independently on an ambiguous base.

use crate::codec::{canonical, decode_base};

/// A fixed-width sliding window of packed bases that resets to empty on
/// any ambiguous input base (an `Empty -> Filling(k) -> Full` state
/// machine).
struct Window {
    len: u32,
    mask: u64,
    word: u64,
    filled: u32,
}

impl Window {
    fn new(len: u32) -> Self {
        Window {
            len,
            mask: crate::codec::mask_for_len(len),
            word: 0,
            filled: 0,
        }
    }

    /// Feeds one base. `None` means ambiguous, which resets the window.
    fn push(&mut self, code: Option<u64>) {
        if self.len == 0 {
            return;
        }
        match code {
            Some(c) => {
                self.word = ((self.word << 2) | c) & self.mask;
                self.filled = (self.filled + 1).min(self.len);
            }
            None => {
                self.word = 0;
                self.filled = 0;
            }
        }
    }

    fn is_full(&self) -> bool {
        self.filled >= self.len
    }

    fn value(&self) -> u64 {
        self.word
    }
}

fn base_code(b: u8) -> Option<u64> {
    crate::codec::encode_base(b)
}

/// Enumerates every fully-accumulated leader in single mode.
/// Leaders are optionally canonicalised.
pub fn enumerate_leaders(read: &[u8], leader_len: u32, canonical_form: bool) -> Vec<u64> {
    let mut window = Window::new(leader_len);
    let mut out = Vec::new();
    for &b in read {
        window.push(base_code(b));
        if window.is_full() {
            let v = window.value();
            out.push(if canonical_form {
                canonical(v, leader_len)
            } else {
                v
            });
        }
    }
    out
}

/// Enumerates every `(leader, follower)` pair in pair mode: the leader
/// window stays `gap_len + follower_len` positions behind the follower
/// window as both slide forward one base per iteration.
pub fn enumerate_pairs(read: &[u8], leader_len: u32, gap_len: u32, follower_len: u32) -> Vec<(u64, u64)> {
    let read_len = read.len() as u32;
    if follower_len == 0 || leader_len + gap_len + follower_len > read_len {
        return Vec::new();
    }

    let mut leader = Window::new(leader_len);
    let mut follower = Window::new(follower_len);
    let follower_start_pos = leader_len + gap_len;

    // Pre-fill both windows up to one base short of full.
    for i in 0..leader_len - 1 {
        leader.push(base_code(read[i as usize]));
    }
    for i in follower_start_pos..follower_start_pos + follower_len - 1 {
        follower.push(base_code(read[i as usize]));
    }

    let mut out = Vec::new();
    let start = follower_start_pos + follower_len - 1;
    for i in start..read_len {
        let t_symbol = base_code(read[i as usize]);
        let lead_idx = i - follower_len - gap_len;
        let a_symbol = base_code(read[lead_idx as usize]);

        follower.push(t_symbol);
        leader.push(a_symbol);

        if leader.is_full() && follower.is_full() {
            out.push((leader.value(), follower.value()));
        }
    }
    out
}

pub fn decode_leader(word: u64, len: u32) -> Vec<u8> {
    (0..len).rev().map(|i| decode_base(word >> (2 * i))).collect()
}
