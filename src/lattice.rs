//! The `Lattice` is an ordered set of `Layer`s, modelling superposed field
//! sources (e.g. the main magnets and a separate corrector layer).

use crate::errors::*;
use crate::layer::Layer;
use crate::region::Region;
use crate::Float;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Lattice {
    layers: Vec<Layer>,
}

impl Lattice {
    /// Loads one layer per file, in the given order.
    pub fn load<P: AsRef<Path>>(files: &[P]) -> Result<Lattice> {
        if files.is_empty() {
            bail!("no lattice files given");
        }
        let layers = files
            .iter()
            .map(Layer::load)
            .collect::<Result<Vec<_>>>()?;
        Ok(Lattice { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns one region per layer, covering `s`.
    pub fn get(&self, s: Float) -> Vec<&Region> {
        self.layers.iter().map(|layer| layer.get(s)).collect()
    }

    /// True iff every layer reports vacuum at `s`.
    pub fn is_vacuum(&self, s: Float) -> bool {
        self.layers.iter().all(|layer| layer.get(s).is_vacuum())
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
    fn cover_invariant_holds_across_layers() {
        let f1 = lattice_file("MB 0.0 1.0 0.1 0 0 0 0 0 0\nMB 2.0 1.0 0.1 0 0 0 0 0 0\n");
        let f2 = lattice_file("CORR 0.5 0.2 0.01 0 0 0 0 0 0\n");
        let lattice = Lattice::load(&[f1.path(), f2.path()]).unwrap();

        for tenth in -20..50 {
            let s = tenth as Float / 10.0;
            let regions = lattice.get(s);
            assert_eq!(regions.len(), 2);
            for r in regions {
                assert!(s >= r.left() - 1e-9 && s <= r.right() + 1e-9);
            }
        }
    }

    #[test]
    fn vacuum_conjunction_across_layers() {
        let f1 = lattice_file("MB 0.0 1.0 0.1 0 0 0 0 0 0\n");
        let f2 = lattice_file("CORR 5.0 1.0 0.01 0 0 0 0 0 0\n");
        let lattice = Lattice::load(&[f1.path(), f2.path()]).unwrap();

        // inside layer-1's magnet but far outside layer-2's envelope: layer 2
        // reports vacuum (outside envelope), layer 1 does not.
        assert!(!lattice.is_vacuum(0.5));
    }
}
