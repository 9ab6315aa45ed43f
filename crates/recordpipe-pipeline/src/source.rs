//! Synthetic record generation and inter-record pacing.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recordpipe_record::{CourseMark, Record, MAX_MARK};

const NAMES: [&str; 5] = ["Mukelwe", "Seluleko", "Neliswa", "Munashe", "Tema"];
const PROGRAMMES: [&str; 3] = [
    "BSc Information Technology",
    "BSc Computer Science",
    "Software Engineering",
];
const COURSES: [&str; 4] = ["Programming", "Networking", "Databases", "AI"];

/// Identifier of the `seq`-th record under `prefix` (`student` by default).
pub fn record_identifier(prefix: &str, seq: u64) -> String {
    format!("{prefix}{seq}.xml")
}

/// Produces the records a producer loop sends.
pub trait RecordSource: Send {
    /// Record for the `seq`-th slot (1-based).
    fn next_record(&mut self, seq: u64) -> Record;
}

impl<F> RecordSource for F
where
    F: FnMut(u64) -> Record + Send,
{
    fn next_record(&mut self, seq: u64) -> Record {
        self(seq)
    }
}

/// Random student records.
#[derive(Debug, Clone)]
pub struct RandomRecords {
    rng: StdRng,
}

impl RandomRecords {
    /// Seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.rng.gen_range(0..options.len())]
    }
}

impl Default for RandomRecords {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSource for RandomRecords {
    fn next_record(&mut self, _seq: u64) -> Record {
        let name = self.pick(&NAMES);
        let student_id = self.rng.gen_range(10_000_000u32..=99_999_999).to_string();
        let programme = self.pick(&PROGRAMMES);
        let marks = COURSES
            .iter()
            .map(|course| CourseMark::saturating(*course, self.rng.gen_range(0..=MAX_MARK)))
            .collect();
        Record::new(name, student_id, programme, marks)
    }
}

/// Random delay between records, drawn uniformly from `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// No delay.
    pub fn none() -> Self {
        Self::default()
    }

    /// Delay between `min` and `max`; the bounds are swapped if reversed.
    pub fn between(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn is_none(&self) -> bool {
        self.max.is_zero()
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw the next delay.
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Sleep for [`next_delay`](Self::next_delay).
    pub fn wait(&self) {
        if self.is_none() {
            return;
        }
        thread::sleep(self.next_delay());
    }
}
