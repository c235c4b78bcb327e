//! Indicative TVOC concentrations derived from the VOC index
//!
//! Based on the Sensirion building standards application note, each estimate
//! is `(ln(501 - index) - 6.24) * k` for a reference-gas specific constant.
//!
//! Copyright 2019 Ryan Kurte

const TVOC_LOG_OFFSET: f32 = 6.24;

/// Ethanol equivalent, ppb
const K_ETHANOL: f32 = -381.97;
/// WELL Building Standard (Molhave mixture equivalent), µg/m³
const K_WELL: f32 = -996.94;
/// RESET Air (isobutylene equivalent), µg/m³
const K_RESET: f32 = -878.53;

/// Largest index the formulas are evaluated at below the 501 cut-off
const MAX_INDEX: f32 = 500.9;

fn tvoc(voc_index: f32, k: f32) -> f32 {
    if voc_index >= 501.0 {
        return 0.0;
    }
    let index = voc_index.min(MAX_INDEX);

    ((501.0 - index).ln() - TVOC_LOG_OFFSET) * k
}

/// TVOC as ethanol equivalent in ppb
pub fn tvoc_ethanol(voc_index: f32) -> f32 {
    tvoc(voc_index, K_ETHANOL)
}

/// TVOC for the WELL Building Standard in µg/m³
pub fn tvoc_well(voc_index: f32) -> f32 {
    tvoc(voc_index, K_WELL)
}

/// TVOC for RESET Air in µg/m³
pub fn tvoc_reset(voc_index: f32) -> f32 {
    tvoc(voc_index, K_RESET)
}

/// All three estimates for a single VOC index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tvoc {
    pub ethanol_ppb: f32,
    pub well: f32,
    pub reset: f32,
}

impl Tvoc {
    pub fn from_voc_index(voc_index: f32) -> Self {
        Tvoc {
            ethanol_ppb: tvoc_ethanol(voc_index),
            well: tvoc_well(voc_index),
            reset: tvoc_reset(voc_index),
        }
    }
}
