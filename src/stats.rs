//! # Feature: Dashboard Placeholder Stats
//!
//! Deterministic, seeded numbers for the admin dashboard. These are synthetic
//! display values, not measurements; every payload carries `synthetic: true`.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Seeded headline numbers and daily series

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticStats {
    pub synthetic: bool,
    pub seed: String,
    pub total_creators: u32,
    pub total_brands: u32,
    pub active_campaigns: u32,
    pub matches_this_month: u32,
    pub engagement_rate: f64,
}

fn rng_for(seed: &str) -> StdRng {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    StdRng::seed_from_u64(u64::from_le_bytes(bytes))
}

impl SyntheticStats {
    /// Same seed, same numbers.
    pub fn for_seed(seed: &str) -> Self {
        let mut rng = rng_for(seed);
        let total_creators = rng.random_range(1_200..=9_800);
        let total_brands = rng.random_range(150..=1_400);
        let active_campaigns = rng.random_range(40..=total_brands.min(600));
        let matches_this_month = rng.random_range(80..=900);
        // One decimal place, 1.5% to 9.5%
        let engagement_rate = rng.random_range(15u32..=95) as f64 / 10.0;

        SyntheticStats {
            synthetic: true,
            seed: seed.to_string(),
            total_creators,
            total_brands,
            active_campaigns,
            matches_this_month,
            engagement_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticSeries {
    pub synthetic: bool,
    pub seed: String,
    pub values: Vec<u32>,
}

/// A gently wandering daily series for chart placeholders.
pub fn daily_series(seed: &str, days: usize) -> SyntheticSeries {
    let mut rng = rng_for(&format!("{}:series", seed));
    let mut current: i64 = rng.random_range(20..=120);
    let values = (0..days)
        .map(|_| {
            current = (current + rng.random_range(-15..=18)).max(0);
            current as u32
        })
        .collect();

    SyntheticSeries {
        synthetic: true,
        seed: seed.to_string(),
        values,
    }
}
