//! Ideal- and actual-orbit stepper with boundary-snapping step control.

use crate::lattice::Lattice;
use crate::step::Step;
use crate::Float;

/// Settings needed to drive the orbit stepper; mirrors
/// `generator.orbit` in the configuration tree.
#[derive(Debug, Clone, Copy)]
pub struct OrbitParams {
    pub start: Float,
    pub stop: Float,
    pub step_size: Float,
    pub offset_position: Float,
    pub offset_angle: Float,
}

pub struct Orbit {
    params: OrbitParams,
}

impl Orbit {
    pub fn new(params: OrbitParams) -> Orbit {
        Orbit { params }
    }

    /// Builds the initial `Step`, running in the -z direction (`s0ip_prime`
    /// starts at `pi`, unmodified by the offset), offset by the configured
    /// position and angle. `Step::new` derives `xip_prime = s0ip_prime - xp`,
    /// which with `xp = -offset_angle` works out to `pi + offset_angle`.
    pub fn create_step(&self, lattice: &Lattice) -> Step {
        Step::new(
            lattice.layers().len(),
            self.params.start,
            self.params.step_size,
            std::f64::consts::PI as Float,
            self.params.offset_position,
            -self.params.offset_angle,
        )
    }

    /// True while the orbit has not yet crossed the configured stop point.
    pub fn valid(&self, step: &Step) -> bool {
        (step.ds < 0.0 && step.s0ip >= self.params.stop) || (step.ds > 0.0 && step.s0ip <= self.params.stop)
    }

    /// Resets `ds` to the nominal step size, shrinks it to land exactly on
    /// the next region boundary if one lies within the nominal step, then
    /// advances `s0ip` and refreshes `in_vacuum`.
    pub fn step_ideal_orbit(&self, lattice: &Lattice, step: &mut Step) {
        step.ds = self.params.step_size;
        step.on_boundary = false;

        let regions = lattice.get(step.s0ip);
        let mut dmin: Option<Float> = None;
        for region in &regions {
            let dist = if step.ds < 0.0 {
                (step.s0ip - region.left()).abs()
            } else {
                (step.s0ip - region.right()).abs()
            };
            dmin = Some(match dmin {
                None => dist,
                Some(prev) if dist < prev => dist,
                Some(prev) => prev,
            });
        }

        if let Some(dmin) = dmin {
            if dmin > 0.0 && dmin < step.ds.abs() {
                step.ds = if self.params.step_size < 0.0 { -dmin } else { dmin };
                step.on_boundary = true;
            }
        }

        step.s0ip += step.ds;
        step.in_vacuum = lattice.is_vacuum(step.s0ip);
    }

    /// Recomputes the total curvature `(gh, gv)` at the new `s0ip` from the
    /// per-layer curvature caches, then advances the actual orbit.
    pub fn step_actual_orbit(&self, lattice: &Lattice, step: &mut Step) {
        step.gh = 0.0;
        step.gv = 0.0;

        let regions = lattice.get(step.s0ip);
        for (layer_idx, region) in regions.iter().enumerate() {
            if region.is_vacuum() {
                continue;
            }

            let idx = region.index(step.s0ip);
            let is_new_slice = !step.curvatures[layer_idx].matches(region, idx);

            if is_new_slice {
                let mx = step.x - region.offset_horz(idx);
                let my = step.y - region.offset_vert(idx);

                let angle = -region.angle(idx);
                let (s, c) = angle.sin_cos();
                let mx_rot = c * mx - s * my;
                let my_rot = s * mx + c * my;

                let gh = region.k0(idx) + region.k1(idx) * mx_rot - region.sk1(idx) * my_rot;
                let gv = region.sk0(idx) + region.k1(idx) * my_rot + region.sk1(idx) * mx_rot;

                let cache = &mut step.curvatures[layer_idx];
                cache.set_identity(region, idx);
                cache.gh = gh;
                cache.gv = gv;
            } else {
                let cache = &mut step.curvatures[layer_idx];
                cache.gh += step.dl * (region.k1(idx) * step.xp - region.sk1(idx) * step.yp);
                cache.gv += step.dl * (region.k1(idx) * step.yp + region.sk1(idx) * step.xp);
                step.s0ip_prime -= step.ds * region.k0(idx) * region.length(idx);
            }

            step.gh += step.curvatures[layer_idx].gh;
            step.gv += step.curvatures[layer_idx].gv;
        }

        step.dl = if step.in_vacuum {
            step.ds / step.xp.cos()
        } else {
            step.ds * (1.0 + step.gh * step.x)
        };

        step.x += step.dl * step.xp;
        step.y += step.dl * step.yip_prime;
        step.xip_prime += step.gh * step.dl;
        step.yip_prime += step.gv * step.dl;

        if !step.in_vacuum {
            step.xp = step.s0ip_prime - step.xip_prime;
            step.yp = step.yip_prime;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lattice_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", contents).unwrap();
        f
    }

    #[test]
    fn ideal_step_snaps_to_boundary() {
        let f = lattice_file("MB 0.0 1.0 0.1 0 0 0 0 0 0\nMB 2.0 1.0 0.1 0 0 0 0 0 0\n");
        let lattice = Lattice::load(&[f.path()]).unwrap();
        let orbit = Orbit::new(OrbitParams {
            start: 0.95,
            stop: 10.0,
            step_size: 0.1,
            offset_position: 0.0,
            offset_angle: 0.0,
        });
        let mut step = orbit.create_step(&lattice);
        step.s0ip = 0.95;
        orbit.step_ideal_orbit(&lattice, &mut step);

        assert!((step.ds - 0.05).abs() < 1e-12);
        assert!((step.s0ip - 1.0).abs() < 1e-12);
        assert!(step.on_boundary);
    }

    #[test]
    fn curvature_resets_to_zero_in_all_vacuum_lattice() {
        let f = lattice_file("MB 100.0 1.0 0.1 0 0 0 0 0 0\n");
        let lattice = Lattice::load(&[f.path()]).unwrap();
        let orbit = Orbit::new(OrbitParams {
            start: 0.0,
            stop: 10.0,
            step_size: 0.1,
            offset_position: 0.0,
            offset_angle: 0.0,
        });
        let mut step = orbit.create_step(&lattice);
        orbit.step_ideal_orbit(&lattice, &mut step);
        orbit.step_actual_orbit(&lattice, &mut step);
        assert_eq!(step.gh, 0.0);
        assert_eq!(step.gv, 0.0);
    }

    #[test]
    fn create_step_keeps_s0ip_prime_at_pi_and_folds_offset_into_xip_prime() {
        let f = lattice_file("MB 100.0 1.0 0.1 0 0 0 0 0 0\n");
        let lattice = Lattice::load(&[f.path()]).unwrap();
        let orbit = Orbit::new(OrbitParams {
            start: 0.0,
            stop: 10.0,
            step_size: 0.1,
            offset_position: 0.002,
            offset_angle: 0.001,
        });
        let step = orbit.create_step(&lattice);

        assert!((step.s0ip_prime - std::f64::consts::PI as Float).abs() < 1e-15);
        assert!((step.xp - (-0.001)).abs() < 1e-15);
        assert!((step.xip_prime - (std::f64::consts::PI as Float + 0.001)).abs() < 1e-15);
        assert_eq!(step.x, 0.002);
    }

    #[test]
    fn valid_respects_direction_of_travel() {
        let orbit = Orbit::new(OrbitParams {
            start: 0.0,
            stop: 10.0,
            step_size: 0.1,
            offset_position: 0.0,
            offset_angle: 0.0,
        });
        let mut step = Step::new(0, 5.0, 0.1, 0.0, 0.0, 0.0);
        assert!(orbit.valid(&step));
        step.s0ip = 11.0;
        assert!(!orbit.valid(&step));

        step.ds = -0.1;
        step.s0ip = 5.0;
        assert!(orbit.valid(&step));
    }
}
