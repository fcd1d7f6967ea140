//! Sampling of CPU, memory, disk and temperature readings.
//!
//! Every reading degrades to `0.0` when its source is unavailable, so [`MetricSampler::sample`]
//! never fails.

use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use serde::Serialize;

use crate::{probe::SystemProbe, regex};

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const THERMAL_ROOT: &str = "/sys/class/thermal";

/// Thermal zone `type`s that report the CPU package temperature.
const CPU_THERMAL_TYPES: &[&str] = &["x86_pkg_temp", "cpu-thermal", "cpu_thermal", "k10temp", "coretemp"];

/// One immutable set of readings. Percentages are within `0..=100`; a temperature of `0.0` means
/// no sensor could be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub disk_percent: f64,
    pub cpu_temp_celsius: f64,
}

/// Aggregate jiffy counters of the `cpu` line in `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTicks {
    pub total: u64,
    pub idle: u64,
}

/// The baseline for the next CPU usage computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounterState {
    pub previous: Option<CpuTicks>,
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// Only user, nice, system, idle, iowait, irq and softirq are summed. Columns that don't parse
/// count as zero. Returns `None` for anything but the aggregate `cpu` line.
pub fn parse_cpu_ticks(line: &str) -> Option<CpuTicks> {
    let mut columns = line.split_whitespace();
    if columns.next()? != "cpu" {
        return None;
    }
    let ticks = columns.take(7).map(|column| column.parse::<u64>().unwrap_or(0)).collect::<Vec<_>>();
    let column = |i: usize| ticks.get(i).copied().unwrap_or(0);
    Some(CpuTicks { total: ticks.iter().sum(), idle: column(3) + column(4) })
}

/// Compute the CPU usage since the previous reading and return it with the new baseline.
///
/// The very first reading, and a reading where the counters went backwards (e.g. after a counter
/// reset), report `0.0`.
pub fn read_cpu_delta(line: &str, state: CpuCounterState) -> (f64, CpuCounterState) {
    let Some(current) = parse_cpu_ticks(line) else {
        return (0.0, state);
    };
    let percent = match state.previous {
        Some(previous) if current.total > previous.total => {
            let total_delta = (current.total - previous.total) as f64;
            let idle_delta = current.idle.saturating_sub(previous.idle) as f64;
            ((total_delta - idle_delta) / total_delta * 100.0).clamp(0.0, 100.0)
        }
        _ => 0.0,
    };
    (percent, CpuCounterState { previous: Some(current) })
}

/// Share of memory in use, from the contents of `/proc/meminfo`.
pub fn mem_percent(meminfo: &str) -> f64 {
    let field = |re: &regex::Regex| re.captures(meminfo).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<u64>().ok());
    let total = field(regex!(r"MemTotal:\s+(\d+)"));
    let available = field(regex!(r"MemAvailable:\s+(\d+)"));
    match (total, available) {
        (Some(total), Some(available)) if total > 0 => {
            (total.saturating_sub(available) as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        }
        _ => 0.0,
    }
}

pub fn disk_percent(size_bytes: u64, used_bytes: u64) -> f64 {
    if size_bytes == 0 {
        return 0.0;
    }
    (used_bytes as f64 / size_bytes as f64 * 100.0).clamp(0.0, 100.0)
}

/// Convert the contents of a thermal zone's `temp` file (millidegrees) to degrees Celsius.
pub fn parse_temperature(raw: &str) -> Option<f64> {
    raw.trim().parse::<i64>().ok().map(|millis| millis as f64 / 1000.0)
}

/// Find the `temp` file of the first thermal zone that belongs to the CPU.
pub fn discover_thermal_zone(probe: &dyn SystemProbe) -> Option<PathBuf> {
    let zones = probe.list_dir(Path::new(THERMAL_ROOT)).ok()?;
    zones
        .into_iter()
        .filter(|zone| zone.file_name().and_then(|n| n.to_str()).map_or(false, |n| n.starts_with("thermal_zone")))
        .find(|zone| {
            probe.read_text(&zone.join("type")).map_or(false, |kind| CPU_THERMAL_TYPES.contains(&kind.trim()))
        })
        .map(|zone| zone.join("temp"))
}

pub struct MetricSampler {
    probe: Rc<dyn SystemProbe>,
    cpu_state: CpuCounterState,
    configured_zone: PathBuf,
    /// Once a zone is found it is kept. Until then, every sample looks again.
    thermal_zone: Option<PathBuf>,
    reported_missing_zone: bool,
}

impl MetricSampler {
    pub fn new(probe: Rc<dyn SystemProbe>, configured_zone: PathBuf) -> Self {
        Self { probe, cpu_state: CpuCounterState::default(), configured_zone, thermal_zone: None, reported_missing_zone: false }
    }

    pub fn sample(&mut self) -> MetricSnapshot {
        MetricSnapshot {
            cpu_percent: self.sample_cpu(),
            mem_percent: self.sample_mem(),
            disk_percent: self.sample_disk(),
            cpu_temp_celsius: self.sample_temperature(),
        }
    }

    fn sample_cpu(&mut self) -> f64 {
        let stat = match self.probe.read_text(Path::new(PROC_STAT)) {
            Ok(stat) => stat,
            Err(err) => {
                log::debug!("cpu usage unavailable: {}", err);
                return 0.0;
            }
        };
        let line = stat.lines().next().unwrap_or_default();
        let (percent, state) = read_cpu_delta(line, self.cpu_state);
        self.cpu_state = state;
        percent
    }

    fn sample_mem(&self) -> f64 {
        match self.probe.read_text(Path::new(PROC_MEMINFO)) {
            Ok(meminfo) => mem_percent(&meminfo),
            Err(err) => {
                log::debug!("memory usage unavailable: {}", err);
                0.0
            }
        }
    }

    fn sample_disk(&self) -> f64 {
        match self.probe.filesystem_usage(Path::new("/")) {
            Ok(usage) => disk_percent(usage.size_bytes, usage.used_bytes),
            Err(err) => {
                log::debug!("disk usage unavailable: {}", err);
                0.0
            }
        }
    }

    fn sample_temperature(&mut self) -> f64 {
        let Some(zone) = self.thermal_zone() else {
            return 0.0;
        };
        match self.probe.read_text(&zone) {
            Ok(raw) => parse_temperature(&raw).unwrap_or_else(|| {
                log::debug!("unparsable temperature in {}: {:?}", zone.display(), raw);
                0.0
            }),
            Err(err) => {
                log::debug!("temperature unavailable: {}", err);
                0.0
            }
        }
    }

    fn thermal_zone(&mut self) -> Option<PathBuf> {
        if let Some(zone) = &self.thermal_zone {
            return Some(zone.clone());
        }
        let zone = if self.probe.is_file(&self.configured_zone) {
            Some(self.configured_zone.clone())
        } else {
            discover_thermal_zone(self.probe.as_ref())
        };
        match &zone {
            Some(zone) if *zone != self.configured_zone => {
                log::info!("Thermal zone {} does not exist, using {} instead", self.configured_zone.display(), zone.display())
            }
            Some(_) => {}
            None if !self.reported_missing_zone => {
                log::warn!("No CPU thermal zone found, temperature will be reported as 0 until one appears");
                self.reported_missing_zone = true;
            }
            None => {}
        }
        self.thermal_zone = zone.clone();
        zone
    }
}
