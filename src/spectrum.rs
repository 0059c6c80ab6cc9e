//! Tabulated PDF/CDF of the universal synchrotron-radiation spectrum
//! (G. J. Roy, NIM A298 (1990) 128-133) and an inverse-CDF energy sampler.

use crate::errors::*;
use crate::Float;
use lerp::Lerp;
use rand::Rng;
use rand_pcg::Pcg64;
use rand::SeedableRng;

const SPECTRUM_NORM: Float = 0.620_350_49; // 9*sqrt(3) / (8*pi)
const BESSEL_ORDER: Float = 5.0 / 3.0;

/// Modified Bessel function of the second kind via its integral
/// representation `K_nu(x) = int_0^inf exp(-x*cosh(u)) cosh(nu*u) du`,
/// evaluated with adaptive Simpson quadrature over a domain truncated where
/// the integrand has decayed below machine-relevant precision.
fn bessel_k(nu: Float, x: Float) -> Float {
    if x <= 0.0 {
        return Float::INFINITY;
    }
    let target_decades = 40.0;
    let ratio = target_decades / x;
    let upper = if ratio <= 1.0 { 5.0 } else { ratio.acosh() + 1.0 };
    let f = |u: Float| (-x * u.cosh()).exp() * (nu * u).cosh();
    adaptive_simpson(&f, 0.0, upper, 1e-12)
}

fn bessel_k53(x: Float) -> Float {
    bessel_k(BESSEL_ORDER, x)
}

/// `E_5/3(x) = int_x^inf K_5/3(xi) dxi`, computed via the substitution
/// `xi = x - ln(t)` which maps the semi-infinite domain onto `(0, 1]` while
/// keeping the integrand smooth and bounded as `t -> 0`.
fn k53_tail_integral(x: Float) -> Float {
    if x <= 0.0 {
        return Float::INFINITY;
    }
    let f = |t: Float| {
        if t <= 0.0 {
            return 0.0;
        }
        let xi = x - t.ln();
        bessel_k53(xi) / t
    };
    adaptive_simpson(&f, 1e-300, 1.0, 1e-10)
}

/// Value of the normalized Roy spectrum at `x = omega/omega_c`.
fn spectrum_value(x: Float) -> Float {
    if x <= 0.0 {
        0.0
    } else {
        SPECTRUM_NORM * x * k53_tail_integral(x)
    }
}

fn simpson(f: &dyn Fn(Float) -> Float, a: Float, b: Float, fa: Float, fm: Float, fb: Float) -> Float {
    (b - a) / 6.0 * (fa + 4.0 * fm + fb)
}

/// Recursive adaptive Simpson quadrature.
fn adaptive_simpson_rec(
    f: &dyn Fn(Float) -> Float,
    a: Float,
    b: Float,
    fa: Float,
    fm: Float,
    fb: Float,
    whole: Float,
    tol: Float,
    depth: u32,
) -> Float {
    let m = (a + b) / 2.0;
    let lm = (a + m) / 2.0;
    let rm = (m + b) / 2.0;
    let flm = f(lm);
    let frm = f(rm);

    let left = simpson(f, a, m, fa, flm, fm);
    let right = simpson(f, m, b, fm, frm, fb);

    if depth == 0 || (left + right - whole).abs() < 15.0 * tol {
        return left + right + (left + right - whole) / 15.0;
    }

    adaptive_simpson_rec(f, a, m, fa, flm, fm, left, tol / 2.0, depth - 1)
        + adaptive_simpson_rec(f, m, b, fm, frm, fb, right, tol / 2.0, depth - 1)
}

fn adaptive_simpson(f: &dyn Fn(Float) -> Float, a: Float, b: Float, tol: Float) -> Float {
    let fa = f(a);
    let fb = f(b);
    let m = (a + b) / 2.0;
    let fm = f(m);
    let whole = simpson(f, a, b, fa, fm, fb);
    adaptive_simpson_rec(f, a, b, fa, fm, fb, whole, tol, 30)
}

fn linspace(start: Float, stop: Float, n: usize) -> Vec<Float> {
    if n == 1 {
        return vec![start];
    }
    let step = (stop - start) / (n as Float - 1.0);
    (0..n).map(|i| start + step * i as Float).collect()
}

/// Precomputed tables for the synchrotron-radiation energy spectrum and its
/// inverse-CDF sampler.
pub struct Spectrum {
    resolution: usize,
    interpolate: bool,
    x: Vec<Float>,
    pdf: Vec<Float>,
    lut_x: Vec<Float>,
    lut_y: Vec<Float>,
    rng: Pcg64,
}

impl Spectrum {
    /// Builds the PDF table on `[0, cutoff]` and the inverse-CDF lookup
    /// table, seeding the sampler's PRNG deterministically.
    pub fn initialize(resolution: usize, cutoff: Float, seed: u64, interpolate: bool) -> Result<Spectrum> {
        if resolution < 2 {
            bail!("spectrum resolution must be at least 2, got {}", resolution);
        }

        let x = linspace(0.0, cutoff, resolution);
        let mut pdf: Vec<Float> = x.iter().map(|&xi| spectrum_value(xi)).collect();

        let sum: Float = pdf.iter().sum();
        if !(sum > 0.0) {
            bail!(ErrorKind::NumericalDegeneracy(
                "synchrotron spectrum integrates to zero".into()
            ));
        }
        for p in &mut pdf {
            *p /= sum;
        }

        let lut_x = linspace(0.0, 1.0, resolution);
        let lut_y = inverse_cdf(&x, &pdf, &lut_x);

        Ok(Spectrum {
            resolution,
            interpolate,
            x,
            pdf,
            lut_x,
            lut_y,
            rng: Pcg64::seed_from_u64(seed),
        })
    }

    pub fn pdf(&self) -> (&[Float], &[Float]) {
        (&self.x, &self.pdf)
    }

    pub fn lut(&self) -> &[Float] {
        &self.lut_y
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Draws `number` photon energies from the spectrum scaled by
    /// `critical_e`, discarding draws below `cutoff_e` (hard low-energy
    /// cutoff looked up once from the inverse-CDF table).
    pub fn random(&mut self, critical_e: Float, number: usize, cutoff_e: Float) -> Vec<Float> {
        let search_value = cutoff_e / critical_e;
        let j = upper_bound(&self.lut_y, search_value);
        let u_cut = if j > 0 { self.lut_x[j - 1] } else { self.lut_x[0] };

        let mut out = Vec::with_capacity(number);
        for _ in 0..number {
            let u: Float = self.rng.gen_range(0.0, 1.0);
            if u < u_cut {
                continue;
            }

            let i = ((u * self.resolution as Float).floor() as usize).min(self.resolution - 1);

            let value = if !self.interpolate {
                self.lut_y[i]
            } else {
                let r = (i + 1).min(self.resolution - 1);
                let l = r - 1;
                let span = self.lut_x[r] - self.lut_x[l];
                let t = if span > 0.0 { (u - self.lut_x[l]) / span } else { 0.0 };
                self.lut_y[l].lerp(self.lut_y[r], t)
            };

            out.push(critical_e * value);
        }

        out
    }
}

/// Smallest index `i` with `sorted[i] > value`, i.e. `i` such that
/// `sorted[..i] <= value < sorted[i..]`. `sorted` must be non-decreasing.
fn upper_bound(sorted: &[Float], value: Float) -> usize {
    sorted.partition_point(|&v| v <= value)
}

/// Inverts the discrete distribution with masses `pdf` on support `x` at
/// each probability in `probs`, returning `x[j]` where `j` is the smallest
/// index whose cumulative mass reaches the target probability.
fn inverse_cdf(x: &[Float], pdf: &[Float], probs: &[Float]) -> Vec<Float> {
    let mut cdf = Vec::with_capacity(pdf.len());
    let mut acc = 0.0;
    for &p in pdf {
        acc += p;
        cdf.push(acc);
    }

    probs
        .iter()
        .map(|&q| {
            let j = cdf.partition_point(|&c| c < q);
            x[j.min(x.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_normalizes_to_one() {
        let spectrum = Spectrum::initialize(200, 10.0, 1817, false).unwrap();
        let (_, pdf) = spectrum.pdf();
        let sum: Float = pdf.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn lut_is_non_decreasing() {
        let spectrum = Spectrum::initialize(200, 10.0, 1817, false).unwrap();
        let lut = spectrum.lut();
        for w in lut.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn sampled_energies_respect_cutoff() {
        let mut spectrum = Spectrum::initialize(500, 10.0, 42, true).unwrap();
        let critical_e = 1.0;
        let cutoff_e = 0.05;
        let energies = spectrum.random(critical_e, 2000, cutoff_e);
        assert!(!energies.is_empty());
        for e in energies {
            assert!(e >= cutoff_e - 1e-9);
        }
    }

    #[test]
    fn determinism_given_fixed_seed() {
        let mut a = Spectrum::initialize(300, 10.0, 7, true).unwrap();
        let mut b = Spectrum::initialize(300, 10.0, 7, true).unwrap();
        let ea = a.random(1.0, 50, 0.0);
        let eb = b.random(1.0, 50, 0.0);
        assert_eq!(ea, eb);
    }

    #[test]
    fn bessel_k53_is_positive_and_decreasing() {
        let a = bessel_k53(0.1);
        let b = bessel_k53(1.0);
        let c = bessel_k53(5.0);
        assert!(a > b && b > c && c > 0.0);
    }

    quickcheck::quickcheck! {
        /// *Spectrum normalization* and *LUT monotonicity*, for arbitrary
        /// resolutions and cutoffs in a sane range.
        fn prop_pdf_normalizes_and_lut_is_sorted(resolution: u8, cutoff_tenths: u8, seed: u64) -> quickcheck::TestResult {
            let resolution = resolution as usize + 2;
            let cutoff = cutoff_tenths as Float * 0.2 + 1.0;
            let spectrum = match Spectrum::initialize(resolution, cutoff, seed, false) {
                Ok(s) => s,
                Err(_) => return quickcheck::TestResult::discard(),
            };

            let (_, pdf) = spectrum.pdf();
            let sum: Float = pdf.iter().sum();
            if (sum - 1.0).abs() > 1e-9 {
                return quickcheck::TestResult::failed();
            }
            if spectrum.lut().windows(2).any(|w| w[1] < w[0]) {
                return quickcheck::TestResult::failed();
            }
            quickcheck::TestResult::passed()
        }

        /// *Energy sampler cutoff*: every drawn energy is at or above the
        /// requested cutoff, for arbitrary cutoff fractions of the critical
        /// energy.
        fn prop_sampled_energies_respect_cutoff(cutoff_frac: u8, seed: u64) -> quickcheck::TestResult {
            let cutoff_frac = (cutoff_frac as Float) / 255.0 * 0.5;
            let mut spectrum = Spectrum::initialize(200, 10.0, seed, true).unwrap();
            let critical_e = 1.0;
            let cutoff_e = cutoff_frac * critical_e;
            let energies = spectrum.random(critical_e, 500, cutoff_e);
            if energies.iter().any(|&e| e < cutoff_e - 1e-9) {
                return quickcheck::TestResult::failed();
            }
            quickcheck::TestResult::passed()
        }
    }
}
