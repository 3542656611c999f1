//! CSV export for tick records and ledger segments.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::room::ledger::Bill;
use crate::sim::types::TickRecord;

/// Column header for per-tick telemetry.
const TICK_HEADER: &str = "tick,time_secs,running,waiting,stopped,off,\
                           total_energy,total_fee,preemptions,rotations";

/// Column header for ledger segments.
const SEGMENT_HEADER: &str = "room,stay_id,start_secs,duration_minutes,fan_speed,energy,fee";

/// Exports tick records to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_ticks_csv(records: &[TickRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_ticks_csv(records, io::BufWriter::new(file))
}

/// Writes tick records as CSV to any writer.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_ticks_csv(records: &[TickRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(TICK_HEADER.split(',').map(str::trim))?;

    for r in records {
        wtr.write_record(&[
            r.tick.to_string(),
            format!("{:.1}", r.time_secs),
            r.counts.running.to_string(),
            r.counts.waiting.to_string(),
            r.counts.stopped.to_string(),
            r.counts.off.to_string(),
            format!("{:.4}", r.total_energy),
            format!("{:.2}", r.total_fee),
            r.preemptions.to_string(),
            r.rotations.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports every segment of every bill to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_segments_csv(bills: &[Bill], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_segments_csv(bills, io::BufWriter::new(file))
}

/// Writes ledger segments as CSV, one row per segment, grouped by room.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_segments_csv(bills: &[Bill], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(SEGMENT_HEADER.split(','))?;

    for bill in bills {
        for s in &bill.segments {
            wtr.write_record(&[
                bill.room_id.to_string(),
                s.stay_id.clone().unwrap_or_default(),
                format!("{:.1}", s.start_secs),
                format!("{:.2}", s.duration_minutes),
                s.fan_speed.to_string(),
                format!("{:.4}", s.energy),
                format!("{:.2}", s.fee),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
