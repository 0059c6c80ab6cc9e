//! A `Layer` is an ordered, gap-free sequence of regions loaded from one
//! lattice text file. Gaps between successive records in the file are
//! bridged with a synthesized vacuum region so that no two magnet regions
//! are ever adjacent.

use crate::consts::BOUNDARY_EPS;
use crate::errors::*;
use crate::region::{Region, SliceParams};
use crate::Float;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Layer {
    filename: String,
    /// left border of each region, parallel to `regions`
    left: Vec<Float>,
    regions: Vec<Region>,
}

impl Layer {
    /// Parses one lattice file into a layer. Every non-empty line must carry
    /// at least 10 whitespace-delimited tokens:
    /// `name s l K0*l K1*l SK0*l SK1*l angle_deg DX DY`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Layer> {
        let path = path.as_ref();
        let file = File::open(path).chain_err(|| format!("cannot open lattice file '{}'", path.display()))?;
        let reader = BufReader::new(file);

        let filename = path.display().to_string();
        let mut regions: Vec<Region> = Vec::new();
        let mut current = Region::new_magnet(0.0);
        let mut have_current = false;
        let mut prev_s: Float = 0.0;
        let mut prev_l: Float = 0.0;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.chain_err(|| format!("cannot read '{}'", filename))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 10 {
                return Err(ErrorKind::LatticeParse(
                    filename.clone(),
                    lineno + 1,
                    format!("expected at least 10 tokens, found {}", tokens.len()),
                )
                .into());
            }

            let parse = |tok: &str, field: &str| -> Result<Float> {
                tok.parse::<Float>().chain_err(|| {
                    ErrorKind::LatticeParse(
                        filename.clone(),
                        lineno + 1,
                        format!("field '{}' is not a number: '{}'", field, tok),
                    )
                })
            };

            let s = parse(tokens[1], "s")?;
            let l = parse(tokens[2], "l")?;
            let k0l = parse(tokens[3], "K0*l")?;
            let k1l = parse(tokens[4], "K1*l")?;
            let sk0l = parse(tokens[5], "SK0*l")?;
            let sk1l = parse(tokens[6], "SK1*l")?;
            let angle_deg = parse(tokens[7], "angle_deg")?;
            let dh = parse(tokens[8], "DX")?;
            let dv = parse(tokens[9], "DY")?;

            if l <= 0.0 {
                return Err(ErrorKind::LatticeParse(
                    filename.clone(),
                    lineno + 1,
                    format!("slice length must be positive, got {}", l),
                )
                .into());
            }

            if prev_l > 0.0 && (prev_s + prev_l - s).abs() > BOUNDARY_EPS {
                if s < prev_s + prev_l - BOUNDARY_EPS {
                    return Err(ErrorKind::LatticeParse(
                        filename.clone(),
                        lineno + 1,
                        format!(
                            "overlapping slices: previous slice ends at {}, next starts at {}",
                            prev_s + prev_l,
                            s
                        ),
                    )
                    .into());
                }

                if have_current {
                    regions.push(current);
                }
                regions.push(Region::vacuum(prev_s + prev_l, s));
                current = Region::new_magnet(s);
                have_current = false;
            }

            current.push_slice(
                s,
                SliceParams {
                    k0: k0l / l,
                    k1: k1l / l,
                    sk0: sk0l / l,
                    sk1: sk1l / l,
                    dh,
                    dv,
                    angle_deg,
                    length: l,
                },
            );
            have_current = true;

            prev_s = s;
            prev_l = l;
        }

        if have_current {
            regions.push(current);
        }

        if regions.is_empty() {
            bail!("lattice file '{}' contains no records", filename);
        }

        let left = regions.iter().map(Region::left).collect();
        Ok(Layer { filename, left, regions })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the region covering `s`, or a synthesized empty vacuum
    /// region if `s` lies outside this layer's envelope.
    pub fn get(&self, s: Float) -> &Region {
        if s < self.regions[0].left() || s > self.regions[self.regions.len() - 1].right() {
            return Self::outside_envelope_region();
        }

        let idx = match self
            .left
            .binary_search_by(|probe| probe.partial_cmp(&s).unwrap())
        {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        &self.regions[idx]
    }

    fn outside_envelope_region() -> &'static Region {
        use std::sync::OnceLock;
        static EMPTY: OnceLock<Region> = OnceLock::new();
        EMPTY.get_or_init(Region::empty)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}
