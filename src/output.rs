//! Numeric record sinks (with both `nth_step` and `fraction` downsampling)
//! and the HepEvt-formatted photon event sink.

use crate::consts::format_e6;
use crate::errors::*;
use crate::photons::Event;
use crate::settings::SinkSettings;
use crate::Float;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A disabled/unopened `Output` silently drops every write, so callers never
/// need to branch on whether a sink is active.
pub struct Output {
    writer: Option<BufWriter<File>>,
    nth_step: Option<u64>,
    fraction: Option<Float>,
    call_count: u64,
}

impl Output {
    pub fn disabled() -> Output {
        Output {
            writer: None,
            nth_step: None,
            fraction: None,
            call_count: 0,
        }
    }

    pub fn open(directory: &Path, settings: &SinkSettings) -> Result<Output> {
        if !settings.enabled {
            return Ok(Output::disabled());
        }
        let filename = settings
            .filename
            .as_ref()
            .ok_or_else(|| Error::from("sink is enabled but has no 'filename'"))?;
        let path = directory.join(filename);
        let file = File::create(&path).chain_err(|| format!("cannot create output file '{}'", path.display()))?;

        Ok(Output {
            writer: Some(BufWriter::new(file)),
            nth_step: settings.nth_step,
            fraction: settings.fraction,
            call_count: 0,
        })
    }

    fn should_emit(&mut self) -> bool {
        self.call_count += 1;

        if let Some(n) = self.nth_step {
            return n > 0 && self.call_count % n == 0;
        }
        if let Some(fraction) = self.fraction {
            // mirrors the original tool's `fraction` sink: `every_nth =
            // round(1/fraction)`, then the same modulo test as `nth_step`.
            let every_nth = (1.0 / fraction).round().max(1.0) as u64;
            return self.call_count % every_nth == 0;
        }
        true
    }

    /// Writes `record` iff the sink is open and the downsampling condition
    /// admits this call.
    pub fn write(&mut self, record: &str) -> Result<()> {
        if self.writer.is_none() {
            return Ok(());
        }
        if !self.should_emit() {
            return Ok(());
        }
        if let Some(w) = &mut self.writer {
            w.write_all(record.as_bytes())?;
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(w) = &mut self.writer {
            w.flush()?;
        }
        self.writer = None;
        Ok(())
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Writes photon events in HepEvt-style text: one header line per event
/// (photon count, vertex position, and the optional compact-mode
/// `num_photons`/`critical_e` fields), followed by one `px py pz` line per
/// photon.
pub struct EventSink {
    writer: Option<BufWriter<File>>,
}

impl EventSink {
    pub fn disabled() -> EventSink {
        EventSink { writer: None }
    }

    pub fn open(directory: &Path, settings: &SinkSettings) -> Result<EventSink> {
        if !settings.enabled {
            return Ok(EventSink::disabled());
        }
        let filename = settings
            .filename
            .as_ref()
            .ok_or_else(|| Error::from("event sink is enabled but has no 'filename'"))?;
        let path = directory.join(filename);
        let file = File::create(&path).chain_err(|| format!("cannot create output file '{}'", path.display()))?;

        Ok(EventSink {
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Header: `<photon count> <vx> <vy> <vz> [num_photons] [critical_e]`;
    /// body: one `px py pz` line per photon.
    pub fn write_events(&mut self, vertex_events: &[Event]) -> Result<()> {
        let w = match &mut self.writer {
            Some(w) => w,
            None => return Ok(()),
        };

        for event in vertex_events {
            write!(
                w,
                "{} {} {} {}",
                event.photons.len(),
                format_e6(event.vx),
                format_e6(event.vy),
                format_e6(event.vz)
            )?;
            if let Some(n) = event.num_photons {
                write!(w, " {}", n)?;
            }
            if let Some(ec) = event.critical_e {
                write!(w, " {}", format_e6(ec))?;
            }
            writeln!(w)?;

            for p in &event.photons {
                writeln!(w, "{} {} {}", format_e6(p.px), format_e6(p.py), format_e6(p.pz))?;
            }
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(w) = &mut self.writer {
            w.flush()?;
        }
        self.writer = None;
        Ok(())
    }
}

impl Drop for EventSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sink(filename: &str, nth_step: Option<u64>, fraction: Option<Float>) -> SinkSettings {
        SinkSettings {
            enabled: true,
            filename: Some(filename.to_string()),
            nth_step,
            fraction,
        }
    }

    #[test]
    fn disabled_sink_never_writes() {
        let mut out = Output::disabled();
        out.write("should not appear\n").unwrap();
    }

    #[test]
    fn nth_step_downsampling_keeps_every_nth_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Output::open(dir.path(), &sink("orbit.dat", Some(3), None)).unwrap();
        for i in 0..9 {
            out.write(&format!("{}\n", i)).unwrap();
        }
        out.close().unwrap();

        let mut contents = String::new();
        File::open(dir.path().join("orbit.dat")).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "2\n5\n8\n");
    }

    #[test]
    fn fraction_downsampling_emits_expected_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Output::open(dir.path(), &sink("orbit.dat", None, Some(0.25))).unwrap();
        for i in 0..20 {
            out.write(&format!("{}\n", i)).unwrap();
        }
        out.close().unwrap();

        let mut contents = String::new();
        File::open(dir.path().join("orbit.dat")).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.lines().count(), 5);
    }

    #[test]
    fn full_mode_event_has_plain_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventSink::open(dir.path(), &sink("photons.dat", None, None)).unwrap();

        let event = Event {
            vx: 1.0,
            vy: 2.0,
            vz: 3.0,
            photons: vec![crate::photons::Photon { px: 0.1, py: 0.2, pz: 0.3 }],
            num_photons: None,
            critical_e: None,
        };
        sink.write_events(&[event]).unwrap();
        sink.close().unwrap();

        let mut contents = String::new();
        File::open(dir.path().join("photons.dat")).unwrap().read_to_string(&mut contents).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "1 1.000000e+00 2.000000e+00 3.000000e+00");
        assert_eq!(lines.next().unwrap(), "1.000000e-01 2.000000e-01 3.000000e-01");
    }

    #[test]
    fn compact_mode_event_appends_count_and_critical_energy() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventSink::open(dir.path(), &sink("photons.dat", None, None)).unwrap();

        let event = Event {
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            photons: vec![crate::photons::Photon { px: 1.0, py: 0.0, pz: 0.0 }],
            num_photons: Some(7),
            critical_e: Some(0.5),
        };
        sink.write_events(&[event]).unwrap();
        sink.close().unwrap();

        let mut contents = String::new();
        File::open(dir.path().join("photons.dat")).unwrap().read_to_string(&mut contents).unwrap();
        let header = contents.lines().next().unwrap();
        assert!(header.starts_with("1 0.000000e+00 0.000000e+00 0.000000e+00 7 5.000000e-01"));
    }
}
