//! Sen6x model registry
//!
//! The SEN6x variants share one command set but expose different measurement
//! channels, each variant has its own Read Measured Values command and frame layout.
//!
//! Copyright 2019 Ryan Kurte

use core::fmt;

use crate::device::Command;

/// Sen6x hardware variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// PM + RH/T
    Sen62 = 0,
    /// PM + RH/T + CO2
    Sen63C = 1,
    /// PM + RH/T + VOC + NOx
    Sen65 = 2,
    /// PM + RH/T + VOC + NOx + CO2
    Sen66 = 3,
    /// PM + RH/T + VOC + NOx + HCHO
    Sen68 = 4,
    /// PM + RH/T + VOC + NOx + HCHO + CO2
    Sen69C = 5,
}

/// Static description of a variant's measurement frame
#[derive(Debug, PartialEq)]
pub struct ModelInfo {
    pub name: &'static str,
    /// Command used to read measured values
    pub read_command: Command,
    /// Number of words in the measured values frame
    pub word_count: usize,
    pub voc_index: Option<usize>,
    pub nox_index: Option<usize>,
    pub co2_index: Option<usize>,
    pub hcho_index: Option<usize>,
    /// Whether the variant reports a meaningful PM4.0 channel
    pub has_pm4: bool,
}

/// Variant table, indexed by `Model as usize`
static MODELS: [ModelInfo; 6] = [
    ModelInfo {
        name: "SEN62",
        read_command: Command::ReadMeasuredValuesSen62,
        word_count: 6,
        voc_index: None,
        nox_index: None,
        co2_index: None,
        hcho_index: None,
        has_pm4: true,
    },
    ModelInfo {
        name: "SEN63C",
        read_command: Command::ReadMeasuredValuesSen63C,
        word_count: 7,
        voc_index: None,
        nox_index: None,
        co2_index: Some(6),
        hcho_index: None,
        has_pm4: false,
    },
    ModelInfo {
        name: "SEN65",
        read_command: Command::ReadMeasuredValuesSen65,
        word_count: 8,
        voc_index: Some(6),
        nox_index: Some(7),
        co2_index: None,
        hcho_index: None,
        has_pm4: false,
    },
    ModelInfo {
        name: "SEN66",
        read_command: Command::ReadMeasuredValuesSen66,
        word_count: 9,
        voc_index: Some(6),
        nox_index: Some(7),
        co2_index: Some(8),
        hcho_index: None,
        has_pm4: true,
    },
    ModelInfo {
        name: "SEN68",
        read_command: Command::ReadMeasuredValuesSen68,
        word_count: 9,
        voc_index: Some(6),
        nox_index: Some(7),
        co2_index: None,
        hcho_index: Some(8),
        has_pm4: false,
    },
    ModelInfo {
        name: "SEN69C",
        read_command: Command::ReadMeasuredValuesSen69C,
        word_count: 10,
        voc_index: Some(6),
        nox_index: Some(7),
        co2_index: Some(9),
        hcho_index: Some(8),
        has_pm4: true,
    },
];

/// Product name fragments in match priority order
const DETECTION_ORDER: [(&str, Model); 6] = [
    ("SEN69", Model::Sen69C),
    ("SEN68", Model::Sen68),
    ("SEN66", Model::Sen66),
    ("SEN65", Model::Sen65),
    ("SEN63", Model::Sen63C),
    ("SEN62", Model::Sen62),
];

impl Model {
    pub const ALL: [Model; 6] = [
        Model::Sen62, Model::Sen63C, Model::Sen65,
        Model::Sen66, Model::Sen68, Model::Sen69C,
    ];

    /// The most feature complete variant, used when detection is inconclusive
    pub const FALLBACK: Model = Model::Sen69C;

    pub fn info(&self) -> &'static ModelInfo {
        &MODELS[*self as usize]
    }

    /// Match a product name reported by the device against the known variants
    pub fn detect(product_name: &str) -> Option<Model> {
        let name = product_name.to_ascii_uppercase();

        DETECTION_ORDER.iter()
            .find(|(fragment, _)| name.contains(fragment))
            .map(|(_, model)| *model)
    }

    /// As [`Model::detect`], falling back to the richest variant for unknown names
    pub fn from_product_name(product_name: &str) -> Model {
        match Self::detect(product_name) {
            Some(m) => m,
            None => {
                warn!("Unknown product '{}', assuming {}", product_name, Self::FALLBACK);
                Self::FALLBACK
            }
        }
    }

    pub fn has_voc(&self) -> bool {
        self.info().voc_index.is_some()
    }

    pub fn has_nox(&self) -> bool {
        self.info().nox_index.is_some()
    }

    pub fn has_co2(&self) -> bool {
        self.info().co2_index.is_some()
    }

    pub fn has_hcho(&self) -> bool {
        self.info().hcho_index.is_some()
    }

    pub fn has_pm4(&self) -> bool {
        self.info().has_pm4
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.info().name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_table_matches_models() {
        for m in Model::ALL.iter() {
            let info = m.info();
            assert_eq!(info.name, format!("{}", m));

            // Every channel offset must fall inside the frame
            for idx in [info.voc_index, info.nox_index, info.co2_index, info.hcho_index].iter() {
                if let Some(i) = idx {
                    assert!(*i >= 6 && *i < info.word_count, "{} offset {} out of frame", m, i);
                }
            }
        }
    }

    #[test]
    fn test_frame_layouts() {
        // (model, command, words, voc, nox, co2, hcho)
        let tests = &[
            (Model::Sen62, 0x04A3, 6, None, None, None, None),
            (Model::Sen63C, 0x0471, 7, None, None, Some(6), None),
            (Model::Sen65, 0x0446, 8, Some(6), Some(7), None, None),
            (Model::Sen66, 0x0300, 9, Some(6), Some(7), Some(8), None),
            (Model::Sen68, 0x0467, 9, Some(6), Some(7), None, Some(8)),
            (Model::Sen69C, 0x04B5, 10, Some(6), Some(7), Some(9), Some(8)),
        ];

        for t in tests {
            let info = t.0.info();
            assert_eq!(info.read_command as u16, t.1, "{}", t.0);
            assert_eq!(info.word_count, t.2, "{}", t.0);
            assert_eq!(info.voc_index, t.3, "{}", t.0);
            assert_eq!(info.nox_index, t.4, "{}", t.0);
            assert_eq!(info.co2_index, t.5, "{}", t.0);
            assert_eq!(info.hcho_index, t.6, "{}", t.0);
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(!Model::Sen62.has_voc() && !Model::Sen62.has_co2());
        assert!(Model::Sen63C.has_co2() && !Model::Sen63C.has_nox());
        assert!(Model::Sen65.has_voc() && Model::Sen65.has_nox() && !Model::Sen65.has_co2());
        assert!(Model::Sen68.has_hcho() && !Model::Sen68.has_co2());
        assert!(Model::Sen69C.has_hcho() && Model::Sen69C.has_co2());

        assert!(Model::Sen62.has_pm4());
        assert!(!Model::Sen63C.has_pm4());
        assert!(Model::Sen66.has_pm4());
    }

    #[test]
    fn test_detect() {
        let tests = &[
            ("SEN62", Model::Sen62),
            ("SEN63C", Model::Sen63C),
            ("SEN65", Model::Sen65),
            ("SEN66", Model::Sen66),
            ("SEN68", Model::Sen68),
            ("SEN69C", Model::Sen69C),
            ("sen66-sin-t", Model::Sen66),
        ];

        for t in tests {
            assert_eq!(Model::detect(t.0), Some(t.1), "{}", t.0);
        }
    }

    #[test]
    fn test_detect_unknown_falls_back() {
        assert_eq!(Model::detect("SPS30"), None);
        assert_eq!(Model::from_product_name("SPS30"), Model::Sen69C);
        assert_eq!(Model::from_product_name(""), Model::Sen69C);
    }
}
