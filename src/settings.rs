//! JSON-keyed configuration tree, with `$var`-style template substitution
//! applied before parsing. Field names and nesting mirror spec.md section 6
//! verbatim.

use crate::errors::*;
use crate::Float;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A numeric or event sink. Both downsampling conventions found in the
/// original tool are accepted: `nth_step` flushes every N accumulated
/// calls, `fraction` flushes a pseudo-random fraction of calls. At most one
/// should be set; if both are, `nth_step` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub nth_step: Option<u64>,
    #[serde(default)]
    pub fraction: Option<Float>,
}

impl SinkSettings {
    pub fn disabled() -> SinkSettings {
        SinkSettings {
            enabled: false,
            filename: None,
            nth_step: None,
            fraction: None,
        }
    }
}

/// `application.output.<sink>`: one entry per numeric sink, plus `events`
/// for the HepEvt photon sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    pub directory: String,
    #[serde(default = "SinkSettings::disabled")]
    pub orbit_parameters: SinkSettings,
    #[serde(default = "SinkSettings::disabled")]
    pub twiss_parameters: SinkSettings,
    #[serde(default = "SinkSettings::disabled")]
    pub radiated_number_photons: SinkSettings,
    #[serde(default = "SinkSettings::disabled")]
    pub events: SinkSettings,
    #[serde(default = "SinkSettings::disabled")]
    pub regions: SinkSettings,
    #[serde(default = "SinkSettings::disabled")]
    pub spectrum_lut: SinkSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub progress: bool,
    pub output: OutputSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `machine`: beam parameters plus the lattice file list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineSettings {
    pub lattice: Vec<String>,
    pub beam_energy: Float,
    pub beam_current: Float,
    #[serde(default)]
    pub crossing_angle: Float,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OffsetSettings {
    #[serde(default)]
    pub position: Float,
    #[serde(default)]
    pub angle: Float,
}

impl Default for OffsetSettings {
    fn default() -> OffsetSettings {
        OffsetSettings { position: 0.0, angle: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrbitSettings {
    pub start: Float,
    pub stop: Float,
    pub step_size: Float,
    #[serde(default)]
    pub offset: OffsetSettings,
}

/// A `{horizontal, vertical}` pair, the shape every `generator.twiss`
/// sub-key uses in the configuration tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HorizontalVertical {
    #[serde(default)]
    pub horizontal: Float,
    #[serde(default)]
    pub vertical: Float,
}

impl Default for HorizontalVertical {
    fn default() -> HorizontalVertical {
        HorizontalVertical { horizontal: 0.0, vertical: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwissSettings {
    #[serde(default)]
    pub alpha: HorizontalVertical,
    pub beta: HorizontalVertical,
    #[serde(default)]
    pub eta: HorizontalVertical,
    #[serde(default)]
    pub eta_derivative: HorizontalVertical,
    pub emittance: HorizontalVertical,
    #[serde(default)]
    pub delta_e: Float,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigmaSettings {
    #[serde(default = "default_sigma")]
    pub h: Float,
    #[serde(default = "default_sigma")]
    pub v: Float,
}

impl Default for SigmaSettings {
    fn default() -> SigmaSettings {
        SigmaSettings { h: default_sigma(), v: default_sigma() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepsSettings {
    #[serde(default = "default_steps")]
    pub h: usize,
    #[serde(default = "default_steps")]
    pub v: usize,
}

impl Default for StepsSettings {
    fn default() -> StepsSettings {
        StepsSettings { h: default_steps(), v: default_steps() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionFilterSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub range: [Float; 2],
}

impl Default for RegionFilterSettings {
    fn default() -> RegionFilterSettings {
        RegionFilterSettings { enabled: false, range: [0.0, 0.0] }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetZoneSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub radius: [Float; 2],
    #[serde(default)]
    pub boundary: [Float; 2],
}

impl Default for TargetZoneSettings {
    fn default() -> TargetZoneSettings {
        TargetZoneSettings {
            enabled: false,
            radius: [0.0, 0.0],
            boundary: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectrumSettings {
    #[serde(default = "default_spectrum_resolution")]
    pub resolution: usize,
    #[serde(default = "default_spectrum_cutoff")]
    pub cutoff: Float,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub interpolation: bool,
}

fn default_spectrum_resolution() -> usize {
    1000
}
fn default_spectrum_cutoff() -> Float {
    10.0
}
fn default_sigma() -> Float {
    5.0
}
fn default_steps() -> usize {
    20
}
fn default_nth_step() -> u64 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhotonsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub full_events: bool,
    #[serde(default = "default_nth_step")]
    pub nth_step: u64,
    pub time: Float,
    #[serde(default)]
    pub energy_cutoff: Float,
    #[serde(default)]
    pub sigma: SigmaSettings,
    #[serde(default)]
    pub steps: StepsSettings,
    #[serde(default)]
    pub region: RegionFilterSettings,
    #[serde(default)]
    pub target_zone: TargetZoneSettings,
    pub spectrum: SpectrumSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSettings {
    pub orbit: OrbitSettings,
    pub twiss: TwissSettings,
    pub photons: PhotonsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub machine: MachineSettings,
    pub generator: GeneratorSettings,
}

impl Settings {
    /// Loads a settings file, substituting `$name`/`${name}` placeholders
    /// from `template_vars` before parsing (mirrors the original tool's
    /// `Template.safe_substitute`: unknown placeholders are left untouched
    /// rather than rejected).
    pub fn load<P: AsRef<Path>>(path: P, template_vars: &HashMap<String, String>) -> Result<Settings> {
        let raw = fs::read_to_string(path.as_ref())
            .chain_err(|| format!("cannot read settings file '{}'", path.as_ref().display()))?;
        let substituted = substitute_template(&raw, template_vars);
        let settings: Settings =
            serde_json::from_str(&substituted).chain_err(|| "settings file is not valid JSON for this schema")?;
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Safe-substitutes `$name` and `${name}` occurrences with values from
/// `vars`; any placeholder not present in `vars` is left verbatim.
fn substitute_template(input: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'{' {
                if let Some(end) = input[i + 2..].find('}') {
                    let name = &input[i + 2..i + 2 + end];
                    match vars.get(name) {
                        Some(value) => {
                            out.push_str(value);
                            i += 2 + end + 1;
                            continue;
                        }
                        None => {
                            out.push_str(&input[i..i + 2 + end + 1]);
                            i += 2 + end + 1;
                            continue;
                        }
                    }
                }
            } else if bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_' {
                let name_start = i + 1;
                let mut name_end = name_start;
                while name_end < bytes.len() && (bytes[name_end].is_ascii_alphanumeric() || bytes[name_end] == b'_') {
                    name_end += 1;
                }
                let name = &input[name_start..name_end];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&input[i..name_end]),
                }
                i = name_end;
                continue;
            }
        }
        let ch = input[i..].chars().next().expect("i is a char boundary");
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}
