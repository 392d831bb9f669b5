//! Canned status lines shown while a model call warms up.

use rand::seq::IndexedRandom;

pub const WHERE_TO_EAT: &[&str] = &[
    "Looking for clues in the background...",
    "Reading the signs and the tableware for hints...",
    "Checking the architecture and the street outside...",
    "Comparing the scene with places I know...",
];

pub const CHECK_PREMADE: &[&str] = &[
    "Putting on my inspector hat...",
    "Weighing the evidence from the kitchen...",
    "Comparing notes on colour and cooking style...",
];

pub const CALORIES: &[&str] = &[
    "Adding up the numbers...",
    "Balancing the plate against the treadmill...",
    "Checking portions and cooking oil...",
];

/// A random entry of `presets`, or an empty string for an empty list.
pub fn pick(presets: &[&'static str]) -> &'static str {
    presets.choose(&mut rand::rng()).copied().unwrap_or_default()
}
