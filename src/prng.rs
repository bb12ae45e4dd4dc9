// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is used only for exploration draws and shuffle-based tie breaking,
// seeded explicitly so runs are reproducible.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let state = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state }
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        // Marsaglia / Vigna family. Simple, fast, decent for simulation noise.
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        // Top 53 bits, so every representable step is equally likely.
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        low + (self.next_u64() % span) as usize
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.gen_range_usize(0, i + 1);
            slice.swap(i, j);
        }
    }
}
