use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::anonymize::EntityKind;

const FIRST_NAMES: &[&str] = &[
    "James", "Olivia", "Mateo", "Priya", "Hiroshi", "Amara", "Lukas", "Sofia", "Kwame", "Elena",
    "Omar", "Ingrid", "Tomasz", "Leila", "Diego", "Freya",
];

const LAST_NAMES: &[&str] = &[
    "Harrington", "Okafor", "Lindqvist", "Moreau", "Tanaka", "Castillo", "Novak", "Brennan",
    "Haddad", "Kowalski", "Ferreira", "Whitaker", "Sato", "Mbeki", "Delacroix", "Ostrowski",
];

const CITIES: &[&str] = &[
    "Port Elbridge", "Marlow Heights", "East Calder", "Vennford", "Lake Orrin", "Brackenridge",
    "New Halcott", "Southmere", "Fairhaven", "Kestrel Bay", "Ashbury", "Tollen Falls",
];

const COMPANIES: &[&str] = &[
    "Halvorsen Group", "Brightwater Labs", "Northgate Holdings", "Corvane Systems",
    "Pellmark & Sons", "Ironleaf Partners", "Quillon Industries", "Sable Ridge LLC",
    "Tessaract Analytics", "Wexford Logistics", "Amberline Media", "Oakhurst Capital",
];

/// Seeded source of made-up names, cities and companies.
///
/// The same seed yields the same sequence, so anonymized corpora are
/// reproducible across runs.
pub struct SyntheticValues {
    rng: StdRng,
}

impl SyntheticValues {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A fresh value of the given type.
    pub fn value(&mut self, kind: EntityKind) -> String {
        match kind {
            EntityKind::Person => {
                format!("{} {}", self.pick(FIRST_NAMES), self.pick(LAST_NAMES))
            }
            EntityKind::Location => self.pick(CITIES).to_string(),
            EntityKind::Organization => self.pick(COMPANIES).to_string(),
        }
    }

    fn pick(&mut self, pool: &[&'static str]) -> &'static str {
        pool[self.rng.gen_range(0..pool.len())]
    }
}
