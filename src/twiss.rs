//! Second-order ODE integrator for the beta (as `zeta = sqrt(beta)`) and
//! dispersion `eta` functions.

use crate::beam::Beam;
use crate::lattice::Lattice;
use crate::step::Step;

pub struct Twiss;

impl Twiss {
    pub fn new() -> Twiss {
        Twiss
    }

    /// Advances `zeta`, `eta` and their derivatives by one step, reading the
    /// quadrupole strengths in effect at `step.s0ip` from `lattice`.
    pub fn evolve(&self, lattice: &Lattice, step: &Step, beam: &mut Beam) {
        beam.zetah += beam.zetahp * step.dl;
        beam.zetav += beam.zetavp * step.dl;
        beam.etah += beam.etahp * step.dl;
        beam.etav += beam.etavp * step.dl;

        let mut kh = 0.0;
        let mut kv = 0.0;
        for region in lattice.get(step.s0ip) {
            if !region.is_vacuum() {
                let idx = region.index(step.s0ip);
                kh += region.k1(idx);
                kv -= region.k1(idx);
            }
        }

        if !step.in_vacuum {
            kh = -kh - step.gh * step.gh;
            kv = -kv - step.gv * step.gv;
        } else {
            kh = 0.0;
            kv = 0.0;
        }

        let zetahpp = kh * beam.zetah + 1.0 / beam.zetah.powi(3);
        beam.zetahp += zetahpp * step.dl;
        let zetavpp = kv * beam.zetav + 1.0 / beam.zetav.powi(3);
        beam.zetavp += zetavpp * step.dl;

        let etahpp = kh * beam.etah + step.gh;
        beam.etahp += etahpp * step.dl;
        let etavpp = kv * beam.etav - step.gv;
        beam.etavp += etavpp * step.dl;
    }
}

impl Default for Twiss {
    fn default() -> Twiss {
        Twiss::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use std::io::Write;

    fn empty_vacuum_lattice() -> Lattice {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "MB 1000.0 1.0 0.0 0.0 0 0 0 0 0\n").unwrap();
        Lattice::load(&[f.path()]).unwrap()
    }

    #[test]
    fn drift_propagation_first_order() {
        let lattice = empty_vacuum_lattice();
        let mut step = Step::new(1, 0.0, 0.1, 0.0, 0.0, 0.0);
        step.dl = 0.1;
        step.in_vacuum = true;

        let mut beam = Beam::new(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0).unwrap();
        Twiss::new().evolve(&lattice, &step, &mut beam);

        assert!((beam.zetah - 1.0).abs() < 1e-12);
        assert!((beam.zetahp - 0.1).abs() < 1e-12);
    }
}
