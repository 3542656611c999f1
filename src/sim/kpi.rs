//! Post-hoc KPI computation from tick records.

use std::fmt;

use super::types::TickRecord;

/// Aggregate indicators derived from a complete headless run.
///
/// Computed post-hoc from `Vec<TickRecord>` so the report always agrees with
/// the exported per-tick data.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Number of ticks in the run.
    pub ticks: usize,
    /// Cumulative energy at the final tick.
    pub total_energy: f64,
    /// Cumulative fee at the final tick.
    pub total_fee: f64,
    /// Largest waiting-queue length seen.
    pub peak_waiting: usize,
    /// Mean of in-service count / capacity over all ticks.
    pub mean_utilization: f64,
    pub admissions: u64,
    pub preemptions: u64,
    pub rotations: u64,
    /// Ticks that ended with at least one room waiting.
    pub ticks_with_waiting: usize,
}

impl RunReport {
    pub fn from_records(records: &[TickRecord]) -> Self {
        let Some(last) = records.last() else {
            return Self {
                ticks: 0,
                total_energy: 0.0,
                total_fee: 0.0,
                peak_waiting: 0,
                mean_utilization: 0.0,
                admissions: 0,
                preemptions: 0,
                rotations: 0,
                ticks_with_waiting: 0,
            };
        };

        let mut utilization_sum = 0.0;
        let mut peak_waiting = 0;
        let mut ticks_with_waiting = 0;
        let mut admissions = 0;
        let mut preemptions = 0;
        let mut rotations = 0;

        for r in records {
            if r.counts.capacity > 0 {
                utilization_sum += r.counts.running as f64 / r.counts.capacity as f64;
            }
            peak_waiting = peak_waiting.max(r.counts.waiting);
            if r.counts.waiting > 0 {
                ticks_with_waiting += 1;
            }
            admissions += r.admissions;
            preemptions += r.preemptions;
            rotations += r.rotations;
        }

        Self {
            ticks: records.len(),
            total_energy: last.total_energy,
            total_fee: last.total_fee,
            peak_waiting,
            mean_utilization: utilization_sum / records.len() as f64,
            admissions,
            preemptions,
            rotations,
            ticks_with_waiting,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Report ---")?;
        writeln!(f, "Ticks:                 {}", self.ticks)?;
        writeln!(f, "Total energy:          {:.4}", self.total_energy)?;
        writeln!(f, "Total fee:             {:.2}", self.total_fee)?;
        writeln!(f, "Peak waiting:          {}", self.peak_waiting)?;
        writeln!(f, "Mean utilization:      {:.1}%", 100.0 * self.mean_utilization)?;
        writeln!(f, "Admissions:            {}", self.admissions)?;
        writeln!(f, "Preemptions:           {}", self.preemptions)?;
        writeln!(f, "Rotations:             {}", self.rotations)?;
        write!(f, "Ticks with waiting:    {}", self.ticks_with_waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::StateCounts;

    fn make_record(running: usize, waiting: usize, fee: f64) -> TickRecord {
        TickRecord {
            tick: 0,
            time_secs: 0.0,
            counts: StateCounts {
                total_rooms: running + waiting,
                running,
                waiting,
                stopped: 0,
                off: 0,
                capacity: 2,
            },
            in_service: Vec::new(),
            waiting: Vec::new(),
            total_energy: fee,
            total_fee: fee,
            admissions: 0,
            preemptions: 0,
            rotations: 0,
        }
    }

    #[test]
    fn utilization_is_mean_fraction() {
        let records = vec![make_record(2, 0, 0.0), make_record(1, 0, 0.0)];
        let report = RunReport::from_records(&records);
        assert!((report.mean_utilization - 0.75).abs() < 1e-12);
    }

    #[test]
    fn totals_come_from_last_record() {
        let records = vec![make_record(1, 0, 0.5), make_record(1, 0, 1.25)];
        let report = RunReport::from_records(&records);
        assert_eq!(report.total_fee, 1.25);
    }

    #[test]
    fn waiting_statistics() {
        let records = vec![
            make_record(2, 3, 0.0),
            make_record(2, 0, 0.0),
            make_record(2, 1, 0.0),
        ];
        let report = RunReport::from_records(&records);
        assert_eq!(report.peak_waiting, 3);
        assert_eq!(report.ticks_with_waiting, 2);
    }

    #[test]
    fn sums_activity_counters() {
        let mut records = vec![make_record(1, 1, 0.0); 3];
        records[0].rotations = 1;
        records[2].rotations = 1;
        records[1].preemptions = 2;
        let report = RunReport::from_records(&records);
        assert_eq!(report.rotations, 2);
        assert_eq!(report.preemptions, 2);
    }

    #[test]
    fn empty_records() {
        let report = RunReport::from_records(&[]);
        assert_eq!(report.ticks, 0);
        assert_eq!(report.mean_utilization, 0.0);
    }
}
