//! Randomized per-scenario test data

use acctest_core::{LocationConfig, ResourceAddress};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const RANDOM_INTEGER_MIN: u64 = 100_000_000_000;
const RANDOM_INTEGER_MAX: u64 = 999_999_999_999;
const RANDOM_STRING_LEN: usize = 5;

/// Names and locations shared by every block of one scenario's configuration
///
/// Everything derives from `seed`: the same seed always yields the same
/// names, so a failing run can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestData {
    /// Seed the random values came from
    pub seed: u64,
    /// Twelve-digit integer for numeric name suffixes
    pub random_integer: u64,
    /// Five lowercase letters for names that reject dashes
    pub random_string: String,
    /// Resource type under test
    pub resource_type: String,
    /// Label of the resource under test
    pub label: String,
    /// Locations to deploy into
    pub locations: LocationConfig,
}

impl TestData {
    /// Derive test data from an explicit seed
    #[must_use]
    pub fn from_seed(
        seed: u64,
        resource_type: impl Into<String>,
        label: impl Into<String>,
        locations: LocationConfig,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let random_integer = rng.random_range(RANDOM_INTEGER_MIN..=RANDOM_INTEGER_MAX);
        let random_string = (0..RANDOM_STRING_LEN)
            .map(|_| char::from(rng.random_range(b'a'..=b'z')))
            .collect();

        Self {
            seed,
            random_integer,
            random_string,
            resource_type: resource_type.into(),
            label: label.into(),
            locations,
        }
    }

    /// Derive test data from a fresh random seed
    #[must_use]
    pub fn random(
        resource_type: impl Into<String>,
        label: impl Into<String>,
        locations: LocationConfig,
    ) -> Self {
        Self::from_seed(rand::random(), resource_type, label, locations)
    }

    /// Address of the resource under test
    #[inline]
    #[must_use]
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(&self.resource_type, &self.label)
    }

    /// `type.label` of the resource under test
    #[inline]
    #[must_use]
    pub fn resource_name(&self) -> String {
        self.address().to_string()
    }
}
