//! Binary per-epoch dump sink (A4), modeled on `recording.rs`'s
//! buffered file I/O style. Best-effort: failures are logged and
//! swallowed as `DumpIoError`, never propagated up through the
//! tracking loop.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// One dump record, little-endian field by field.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpRecord {
    pub early_mag: f32,
    pub prompt_mag: f32,
    pub late_mag: f32,
    pub prompt_i: f32,
    pub prompt_q: f32,
    pub sample_counter: u64,
    pub acc_carrier_phase_rad: f32,
    pub carrier_doppler_hz: f32,
    pub code_freq_chips: f32,
    pub carr_err_raw: f32,
    pub carr_err_filt: f32,
    pub code_err_raw: f32,
    pub code_err_filt: f32,
    pub cn0_db_hz: f32,
    pub carrier_lock_test: f32,
    pub rem_code_phase_samples: f32,
    pub next_sample_counter: f64,
}

/// Size in bytes of one on-disk record.
pub const RECORD_SIZE_BYTES: usize =
    4 * 15 // 15 f32 fields
    + 8    // sample_counter: u64
    + 8; // next_sample_counter: f64

pub struct DumpWriter {
    writer: BufWriter<File>,
}

impl DumpWriter {
    /// Opens `<base>_<channel_id>.dat` truncated for binary writing.
    pub fn open(base: &str, channel_id: u32) -> Result<Self> {
        let path = format!("{base}_{channel_id}.dat");
        let file = File::create(Path::new(&path))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_record(&mut self, r: &DumpRecord) -> Result<()> {
        self.writer.write_all(&r.early_mag.to_le_bytes())?;
        self.writer.write_all(&r.prompt_mag.to_le_bytes())?;
        self.writer.write_all(&r.late_mag.to_le_bytes())?;
        self.writer.write_all(&r.prompt_i.to_le_bytes())?;
        self.writer.write_all(&r.prompt_q.to_le_bytes())?;
        self.writer.write_all(&r.sample_counter.to_le_bytes())?;
        self.writer
            .write_all(&r.acc_carrier_phase_rad.to_le_bytes())?;
        self.writer.write_all(&r.carrier_doppler_hz.to_le_bytes())?;
        self.writer.write_all(&r.code_freq_chips.to_le_bytes())?;
        self.writer.write_all(&r.carr_err_raw.to_le_bytes())?;
        self.writer.write_all(&r.carr_err_filt.to_le_bytes())?;
        self.writer.write_all(&r.code_err_raw.to_le_bytes())?;
        self.writer.write_all(&r.code_err_filt.to_le_bytes())?;
        self.writer.write_all(&r.cn0_db_hz.to_le_bytes())?;
        self.writer
            .write_all(&r.carrier_lock_test.to_le_bytes())?;
        self.writer
            .write_all(&r.rem_code_phase_samples.to_le_bytes())?;
        self.writer
            .write_all(&r.next_sample_counter.to_le_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_expected_record_size() {
        let dir = std::env::temp_dir();
        let base = dir.join("gnss_track_dump_test").to_string_lossy().to_string();
        let mut w = DumpWriter::open(&base, 0).unwrap();
        let rec = DumpRecord::default();
        w.write_record(&rec).unwrap();
        w.write_record(&rec).unwrap();
        w.flush().unwrap();
        drop(w);

        let path = format!("{base}_0.dat");
        let mut buf = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf.len(), 2 * RECORD_SIZE_BYTES);
        std::fs::remove_file(&path).ok();
    }
}
