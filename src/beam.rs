//! Twiss state plus the derived beam-envelope geometry.

use crate::errors::*;
use crate::Float;

/// The beam's Twiss parameters and emittances. `zetah`/`zetav` are `sqrt(beta)`
/// and must stay strictly positive; `Twiss::evolve` is the only thing that
/// mutates this state after construction.
#[derive(Debug, Clone, Copy)]
pub struct Beam {
    pub alphah: Float,
    pub alphav: Float,
    pub zetah: Float,
    pub zetav: Float,
    pub zetahp: Float,
    pub zetavp: Float,
    pub etah: Float,
    pub etav: Float,
    pub etahp: Float,
    pub etavp: Float,
    pub emith: Float,
    pub emitv: Float,
    pub delta_e: Float,
}

/// Transverse beam size and correlation coefficients derived from the
/// Twiss state, as used by the photon quadrature.
#[derive(Debug, Clone, Copy)]
pub struct BeamSize {
    pub hsize: Float,
    pub vsize: Float,
    pub ch: Float,
    pub cv: Float,
}

impl Beam {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        alphah: Float,
        alphav: Float,
        betah: Float,
        betav: Float,
        etah: Float,
        etav: Float,
        etahp: Float,
        etavp: Float,
        emith: Float,
        emitv: Float,
        delta_e: Float,
    ) -> Result<Beam> {
        if betah <= 0.0 || betav <= 0.0 {
            bail!(ErrorKind::NumericalDegeneracy(format!(
                "initial beta must be positive, got betah={}, betav={}",
                betah, betav
            )));
        }
        let zetah = betah.sqrt();
        let zetav = betav.sqrt();
        Ok(Beam {
            alphah,
            alphav,
            zetah,
            zetav,
            zetahp: alphah / zetah,
            zetavp: alphav / zetav,
            etah,
            etav,
            etahp,
            etavp,
            emith,
            emitv,
            delta_e,
        })
    }

    /// Returns transverse beam sizes and correlation coefficients. Fatal if
    /// either size has collapsed to zero or below (spec: numerical
    /// degeneracy).
    pub fn size(&self) -> Result<BeamSize> {
        let hsize_sq = self.emith * self.zetah * self.zetah + self.etah * self.etah * self.delta_e * self.delta_e;
        let vsize_sq = self.emitv * self.zetav * self.zetav + self.etav * self.etav * self.delta_e * self.delta_e;

        if hsize_sq <= 0.0 || vsize_sq <= 0.0 {
            bail!(ErrorKind::NumericalDegeneracy(format!(
                "beam size collapsed: hsize^2={}, vsize^2={} (state: {:?})",
                hsize_sq, vsize_sq, self
            )));
        }

        let hsize = hsize_sq.sqrt();
        let vsize = vsize_sq.sqrt();
        let ch = (self.emith * self.zetah * self.zetahp + self.etah * self.etahp * self.delta_e * self.delta_e)
            / hsize_sq;
        let cv = (self.emitv * self.zetav * self.zetavp + self.etav * self.etavp * self.delta_e * self.delta_e)
            / vsize_sq;

        Ok(BeamSize { hsize, vsize, ch, cv })
    }

    /// `alpha_effective = zeta' * zeta`, as written by the `twiss_parameters`
    /// sink.
    pub fn alpha_effective(&self) -> (Float, Float) {
        (self.zetahp * self.zetah, self.zetavp * self.zetav)
    }

    /// Emits one `twiss_parameters` record.
    pub fn twiss_record(&self, s0ip: Float) -> String {
        let (ah, av) = self.alpha_effective();
        format!(
            "{}:{:e}:{:e}:{:e}:{:e}:{:e}:{:e}\n",
            s0ip, ah, av, self.zetah, self.zetav, self.etah, self.etav
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeta_must_stay_positive() {
        let err = Beam::new(0.0, 0.0, -1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0).unwrap_err();
        assert!(format!("{}", err).contains("positive"));
    }

    #[test]
    fn size_reports_degeneracy_when_emittance_and_dispersion_vanish() {
        let beam = Beam::new(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0).unwrap();
        let err = beam.size().unwrap_err();
        assert!(format!("{}", err).contains("degeneracy"));
    }

    #[test]
    fn size_matches_hand_computation() {
        let beam = Beam::new(0.0, 0.0, 4.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0).unwrap();
        let size = beam.size().unwrap();
        assert!((size.hsize - 2.0).abs() < 1e-12);
        assert!((size.vsize - 1.0).abs() < 1e-12);
    }
}
