//! Decoding of Sen6x measured values
//!
//! Copyright 2019 Ryan Kurte

use crate::model::Model;
use crate::physics::Tvoc;

/// Unsigned channel not yet valid
pub const UNSIGNED_INVALID: u16 = 0xFFFF;
/// Signed channel not yet valid
pub const SIGNED_INVALID: u16 = 0x7FFF;

const PM_CHANNELS: usize = 4;
const HUMIDITY_INDEX: usize = 4;
const TEMPERATURE_INDEX: usize = 5;
/// End of the signed RH/T/VOC/NOx block
const SIGNED_END: usize = 8;

/// Sen6x measurement object
#[derive(PartialEq, Clone, Debug)]
pub struct Measurement {
    /// Mass concentration PM1.0 (µg/m³)
    pub pm1_0: f32,
    /// Mass concentration PM2.5 (µg/m³)
    pub pm2_5: f32,
    /// Mass concentration PM4.0 (µg/m³)
    pub pm4_0: f32,
    /// Mass concentration PM10.0 (µg/m³)
    pub pm10_0: f32,
    /// Relative Humidity (%)
    pub humidity: f32,
    /// Temperature in degrees celsius
    pub temperature: f32,
    /// VOC index, 1 - 500
    pub voc_index: Option<f32>,
    /// NOx index, 1 - 500
    pub nox_index: Option<f32>,
    /// CO2 concentration in parts-per-million (PPM)
    pub co2: Option<u16>,
    /// Formaldehyde concentration in parts-per-billion (PPB)
    pub formaldehyde: Option<f32>,
}

impl Measurement {
    /// TVOC estimates, only available with a positive VOC index
    pub fn tvoc(&self) -> Option<Tvoc> {
        self.voc_index
            .filter(|v| *v > 0.0)
            .map(Tvoc::from_voc_index)
    }
}

/// Decode a measured values frame for the provided model
///
/// Returns `None` when the frame is shorter than the model's layout or when any
/// PM, RH/T, VOC or NOx word carries its "not yet valid" sentinel, in which case
/// no channel of the frame may be used. Signed words 4 to 7 are checked whenever
/// the frame carries them, whatever channel they hold on the variant.
/// CO2 is the only channel whose sentinel suppresses just itself.
pub fn decode(model: Model, data: &[u16]) -> Option<Measurement> {
    let info = model.info();
    if data.len() < info.word_count {
        return None;
    }

    if data[..PM_CHANNELS].iter().any(|w| *w == UNSIGNED_INVALID) {
        debug!("PM data invalid, waiting for stabilization");
        return None;
    }

    let signed_end = SIGNED_END.min(info.word_count);
    if data[HUMIDITY_INDEX..signed_end].iter().any(|w| *w == SIGNED_INVALID) {
        debug!("RH/T/VOC/NOx data invalid, waiting for stabilization");
        return None;
    }

    if info.hcho_index.map(|i| data[i] == UNSIGNED_INVALID).unwrap_or(false) {
        debug!("HCHO data invalid, waiting for stabilization");
        return None;
    }

    let co2 = info.co2_index
        .map(|i| data[i])
        .filter(|v| *v != UNSIGNED_INVALID && *v != 0);
    if info.co2_index.is_some() && co2.is_none() {
        debug!("CO2 data not available yet");
    }

    let formaldehyde = info.hcho_index.map(|i| data[i] as f32 / 10.0);

    Some(Measurement {
        pm1_0: data[0] as f32 / 10.0,
        pm2_5: data[1] as f32 / 10.0,
        pm4_0: data[2] as f32 / 10.0,
        pm10_0: data[3] as f32 / 10.0,
        humidity: data[HUMIDITY_INDEX] as i16 as f32 / 100.0,
        temperature: data[TEMPERATURE_INDEX] as i16 as f32 / 200.0,
        voc_index: info.voc_index.map(|i| data[i] as i16 as f32 / 10.0),
        nox_index: info.nox_index.map(|i| data[i] as i16 as f32 / 10.0),
        co2,
        formaldehyde,
    })
}

/// Particle number concentrations (particles/cm³)
#[derive(PartialEq, Clone, Debug, Default)]
pub struct NumberConcentration {
    pub nc0_5: Option<f32>,
    pub nc1_0: Option<f32>,
    pub nc2_5: Option<f32>,
    pub nc4_0: Option<f32>,
    pub nc10_0: Option<f32>,
}

impl NumberConcentration {
    /// Decode the five number concentration words, invalid channels are dropped individually
    pub fn from_words(words: [u16; 5]) -> Self {
        let c = |w: u16| if w == UNSIGNED_INVALID { None } else { Some(w as f32 / 10.0) };

        NumberConcentration {
            nc0_5: c(words[0]),
            nc1_0: c(words[1]),
            nc2_5: c(words[2]),
            nc4_0: c(words[3]),
            nc10_0: c(words[4]),
        }
    }
}
