//! Time and id sources handed to the pipeline instead of read from globals.

use chrono::{Datelike, Local, NaiveDate};
use rand::Rng;

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    /// Year stamped on generated content; December already counts as next year.
    fn content_year(&self) -> i32 {
        let today = self.today();
        if today.month() == 12 {
            today.year() + 1
        } else {
            today.year()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Produces DOM ids for rendered blocks.
pub trait IdSource {
    fn next_id(&mut self, prefix: &str) -> String;
}

/// `prefix-1`, `prefix-2`, ... for reproducible output.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u64,
}

impl IdSource for SequentialIds {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{}-{}", prefix, self.next)
    }
}

/// Nine random base-36 characters per id.
#[derive(Debug, Clone)]
pub struct RandomIds<R> {
    rng: R,
}

impl<R: Rng> RandomIds<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> IdSource for RandomIds<R> {
    fn next_id(&mut self, prefix: &str) -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let suffix: String = (0..9)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{}-{}", prefix, suffix)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn december_rolls_content_year() {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2025, 12, 3).unwrap());
        assert_eq!(clock.content_year(), 2026);
        let clock = FixedClock(NaiveDate::from_ymd_opt(2025, 11, 30).unwrap());
        assert_eq!(clock.content_year(), 2025);
    }

    #[test]
    fn sequential_ids_count_up() {
        let mut ids = SequentialIds::default();
        assert_eq!(ids.next_id("faq"), "faq-1");
        assert_eq!(ids.next_id("refs"), "refs-2");
    }

    #[test]
    fn random_ids_are_seeded() {
        let mut a = RandomIds::new(StdRng::seed_from_u64(7));
        let mut b = RandomIds::new(StdRng::seed_from_u64(7));
        let id = a.next_id("faq");
        assert_eq!(id, b.next_id("faq"));
        assert_eq!(id.len(), "faq-".len() + 9);
    }
}
