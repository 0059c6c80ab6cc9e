//! Top-level orchestration: loads settings and the lattice, opens the
//! configured sinks, and drives the orbit/twiss/photon main loop.

use crate::beam::Beam;
use crate::errors::*;
use crate::lattice::Lattice;
use crate::orbit::{Orbit, OrbitParams};
use crate::output::{EventSink, Output};
use crate::photons::{MachineParams, PhotonGenerator, PhotonsConfig, RegionFilter, TargetZone};
use crate::settings::Settings;
use crate::spectrum::Spectrum;
use crate::step::Step;
use crate::twiss::Twiss;
use pbr::ProgressBar;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Generator {
    settings: Settings,
    output_dir: PathBuf,
    lattice: Lattice,
    orbit: Orbit,
    twiss: Twiss,
    beam: Beam,
    step: Step,
    photons: PhotonGenerator,

    orbit_sink: Output,
    twiss_sink: Output,
    radiated_sink: Output,
    event_sink: EventSink,

    show_progress: bool,
}

impl Generator {
    /// Loads settings (applying `template_vars`), opens the lattice and all
    /// configured sinks, and writes the resolved settings plus any one-shot
    /// dumps (`regions`, `spectrum_lut`) to the output directory.
    pub fn initialize<P: AsRef<Path>>(settings_path: P, template_vars: &HashMap<String, String>) -> Result<Generator> {
        let settings = Settings::load(settings_path, template_vars)?;
        let output_dir = PathBuf::from(&settings.application.output.directory);
        fs::create_dir_all(&output_dir)
            .chain_err(|| format!("cannot create output directory '{}'", output_dir.display()))?;

        fs::write(output_dir.join("settings.json"), settings.to_json_string()?)
            .chain_err(|| "cannot write resolved settings back to the output directory")?;

        let lattice = Lattice::load(&settings.machine.lattice)?;

        let orbit = Orbit::new(OrbitParams {
            start: settings.generator.orbit.start,
            stop: settings.generator.orbit.stop,
            step_size: settings.generator.orbit.step_size,
            offset_position: settings.generator.orbit.offset.position,
            offset_angle: settings.generator.orbit.offset.angle,
        });
        let step = orbit.create_step(&lattice);

        let t = &settings.generator.twiss;
        let beam = Beam::new(
            t.alpha.horizontal,
            t.alpha.vertical,
            t.beta.horizontal,
            t.beta.vertical,
            t.eta.horizontal,
            t.eta.vertical,
            t.eta_derivative.horizontal,
            t.eta_derivative.vertical,
            t.emittance.horizontal,
            t.emittance.vertical,
            t.delta_e,
        )?;

        let p = &settings.generator.photons;
        let spectrum = Spectrum::initialize(
            p.spectrum.resolution,
            p.spectrum.cutoff,
            p.spectrum.seed,
            p.spectrum.interpolation,
        )?;

        let photons = PhotonGenerator::new(
            PhotonsConfig {
                enabled: p.enabled,
                full_events: p.full_events,
                nth_step: p.nth_step,
                time: p.time,
                energy_cutoff: p.energy_cutoff,
                sigma_h: p.sigma.h,
                sigma_v: p.sigma.v,
                steps_h: p.steps.h,
                steps_v: p.steps.v,
                region_filter: RegionFilter {
                    enabled: p.region.enabled,
                    left: p.region.range[0],
                    right: p.region.range[1],
                },
                target_zone: TargetZone {
                    enabled: p.target_zone.enabled,
                    ri: p.target_zone.radius[0],
                    ro: p.target_zone.radius[1],
                    z0: p.target_zone.boundary[0],
                    z1: p.target_zone.boundary[1],
                },
            },
            MachineParams {
                beam_energy: settings.machine.beam_energy,
                beam_current: settings.machine.beam_current,
                crossing_angle: settings.machine.crossing_angle,
            },
            spectrum,
        );

        let orbit_sink = Output::open(&output_dir, &settings.application.output.orbit_parameters)?;
        let twiss_sink = Output::open(&output_dir, &settings.application.output.twiss_parameters)?;
        let radiated_sink = Output::open(&output_dir, &settings.application.output.radiated_number_photons)?;
        let event_sink = EventSink::open(&output_dir, &settings.application.output.events)?;

        if settings.application.output.regions.enabled {
            dump_regions(&output_dir, &settings.application.output, &lattice)?;
        }
        if settings.application.output.spectrum_lut.enabled {
            dump_spectrum_lut(&output_dir, &settings.application.output, &photons)?;
        }

        let show_progress = settings.application.progress;

        Ok(Generator {
            settings,
            output_dir,
            lattice,
            orbit,
            twiss: Twiss::new(),
            beam,
            step,
            photons,
            orbit_sink,
            twiss_sink,
            radiated_sink,
            event_sink,
            show_progress,
        })
    }

    /// Runs the ideal-orbit / actual-orbit / twiss / photon-generation loop
    /// until `Orbit::valid` reports the stop point has been reached.
    pub fn run(&mut self) -> Result<()> {
        let total_steps = ((self.settings.generator.orbit.stop - self.settings.generator.orbit.start)
            / self.settings.generator.orbit.step_size)
            .abs()
            .ceil() as u64;

        let mut progress = if self.show_progress {
            Some(ProgressBar::new(total_steps.max(1)))
        } else {
            None
        };

        while self.orbit.valid(&self.step) {
            self.orbit.step_ideal_orbit(&self.lattice, &mut self.step);
            self.orbit.step_actual_orbit(&self.lattice, &mut self.step);
            self.twiss.evolve(&self.lattice, &self.step, &mut self.beam);

            let photon_out = self.photons.create(&self.lattice, &self.step, &self.beam)?;

            self.orbit_sink.write(&self.step.orbit_record())?;
            self.twiss_sink.write(&self.beam.twiss_record(self.step.s0ip))?;
            if let Some(record) = &photon_out.numeric_record {
                self.radiated_sink.write(record)?;
            }
            if !photon_out.events.is_empty() {
                self.event_sink.write_events(&photon_out.events)?;
            }

            if let Some(bar) = &mut progress {
                bar.inc();
            }
        }

        if let Some(mut bar) = progress {
            bar.finish_print("done");
        }

        Ok(())
    }

    /// Closes every sink. Safe to call more than once; also runs implicitly
    /// via `Drop` on `Output`/`EventSink` if a run is aborted early.
    pub fn terminate(&mut self) -> Result<()> {
        self.orbit_sink.close()?;
        self.twiss_sink.close()?;
        self.radiated_sink.close()?;
        self.event_sink.close()?;
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Overrides `application.progress` from the CLI `--progress` flag.
    pub fn force_progress(&mut self, enabled: bool) {
        self.show_progress = self.show_progress || enabled;
    }
}

/// Dumps, per layer: a `[filename]` header line, then one
/// `TYPE left right slice_count` line per region (`TYPE` is `MAG` or `VAC`).
fn dump_regions(output_dir: &Path, output_settings: &crate::settings::OutputSettings, lattice: &Lattice) -> Result<()> {
    let mut sink = Output::open(output_dir, &output_settings.regions)?;
    for layer in lattice.layers() {
        sink.write(&format!("[{}]\n", layer.filename()))?;
        for region in layer.regions() {
            let kind = if region.is_vacuum() { "VAC" } else { "MAG" };
            sink.write(&format!("{} {:e} {:e} {}\n", kind, region.left(), region.right(), region.count()))?;
        }
    }
    sink.close()
}

/// Dumps the spectrum's inverse-CDF lookup table: resolution on the first
/// line, then one value per line.
fn dump_spectrum_lut(
    output_dir: &Path,
    output_settings: &crate::settings::OutputSettings,
    photons: &PhotonGenerator,
) -> Result<()> {
    let mut sink = Output::open(output_dir, &output_settings.spectrum_lut)?;
    sink.write(&format!("{}\n", photons.spectrum().resolution()))?;
    for &value in photons.spectrum().lut() {
        sink.write(&format!("{:e}\n", value))?;
    }
    sink.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_settings(dir: &Path, lattice_path: &Path) -> PathBuf {
        let json = format!(
            r#"{{
                "application": {{
                    "log_level": "info",
                    "progress": false,
                    "output": {{"directory": "{out}"}}
                }},
                "machine": {{"lattice": ["{lat}"], "beam_energy": 120.0, "beam_current": 0.01}},
                "generator": {{
                    "orbit": {{"start": 0.0, "stop": 1.0, "step_size": 0.1}},
                    "twiss": {{
                        "beta": {{"horizontal": 1.0, "vertical": 1.0}},
                        "emittance": {{"horizontal": 1e-9, "vertical": 1e-11}}
                    }},
                    "photons": {{
                        "time": 1.0,
                        "spectrum": {{"resolution": 50, "cutoff": 10.0, "seed": 1, "interpolation": false}}
                    }}
                }}
            }}"#,
            out = dir.join("out").display(),
            lat = lattice_path.display(),
        );
        let settings_path = dir.join("settings.json");
        let mut f = fs::File::create(&settings_path).unwrap();
        f.write_all(json.as_bytes()).unwrap();
        settings_path
    }

    #[test]
    fn initialize_and_run_short_lattice() {
        let dir = tempfile::tempdir().unwrap();
        let lattice_path = dir.path().join("ring.lat");
        fs::write(&lattice_path, "MB 0.0 2.0 0.1 0 0 0 0 0 0\n").unwrap();

        let settings_path = write_settings(dir.path(), &lattice_path);
        let mut generator = Generator::initialize(&settings_path, &HashMap::new()).unwrap();
        generator.run().unwrap();
        generator.terminate().unwrap();

        assert!(generator.output_dir().join("settings.json").exists());
    }
}
