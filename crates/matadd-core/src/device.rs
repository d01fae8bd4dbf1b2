//! Device inventory records and the probe's CSV output format.
//!
//! The probe is queried with [`QUERY_ARGS`], which yields one line per device:
//! `index, memory.used, memory.total, utilization.gpu` with no header and no
//! units. Parsing is all-or-nothing.

use serde::Serialize;

use crate::error::{MatAddError, Result};

/// Arguments passed to `nvidia-smi`.
pub const QUERY_ARGS: [&str; 2] = [
    "--query-gpu=index,memory.used,memory.total,utilization.gpu",
    "--format=csv,noheader,nounits",
];

/// One accelerator's memory and utilization snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStat {
    /// Device index as reported by the probe.
    pub gpu: String,
    #[serde(rename = "memory_used_MB")]
    pub memory_used_mb: u64,
    #[serde(rename = "memory_total_MB")]
    pub memory_total_mb: u64,
    pub utilization_gpu: u32,
}

/// Parse the probe's stdout into device records.
pub fn parse_query_output(out: &str) -> Result<Vec<DeviceStat>> {
    out.trim()
        .lines()
        .enumerate()
        .map(|(n, line)| parse_line(n + 1, line))
        .collect()
}

fn parse_line(lineno: usize, line: &str) -> Result<DeviceStat> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [idx, used, total, util] = fields.as_slice() else {
        return Err(MatAddError::ProbeExecutionError(format!(
            "unparsable probe output on line {lineno}: expected 4 fields, got {}",
            fields.len()
        )));
    };

    let int = |name: &str, v: &str| -> Result<u64> {
        v.parse::<u64>().map_err(|_| {
            MatAddError::ProbeExecutionError(format!(
                "unparsable probe output on line {lineno}: {name}={v:?} is not an integer"
            ))
        })
    };

    let utilization = int("utilization.gpu", *util)?;
    Ok(DeviceStat {
        gpu: idx.to_string(),
        memory_used_mb: int("memory.used", *used)?,
        memory_total_mb: int("memory.total", *total)?,
        utilization_gpu: u32::try_from(utilization).map_err(|_| {
            MatAddError::ProbeExecutionError(format!(
                "unparsable probe output on line {lineno}: utilization {utilization} out of range"
            ))
        })?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_devices_in_order() {
        let out = "0, 1024, 16384, 12\n1, 2048, 16384, 97\n";
        let stats = parse_query_output(out).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].gpu, "0");
        assert_eq!(stats[0].memory_used_mb, 1024);
        assert_eq!(stats[1].memory_total_mb, 16384);
        assert_eq!(stats[1].utilization_gpu, 97);
    }

    #[test]
    fn empty_output_means_no_devices() {
        assert!(parse_query_output("").unwrap().is_empty());
        assert!(parse_query_output("  \n").unwrap().is_empty());
    }

    #[test]
    fn wrong_field_count_fails_whole_parse() {
        let err = parse_query_output("0, 1, 2, 3\n1, 2, 3\n").unwrap_err();
        assert_eq!(err.client_code().as_str(), "PROBE_EXECUTION_ERROR");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn non_integer_field_fails() {
        let err = parse_query_output("0, [N/A], 16384, 0").unwrap_err();
        assert!(err.to_string().contains("memory.used"));
    }

    #[test]
    fn serializes_with_probe_field_names() {
        let s = DeviceStat {
            gpu: "0".into(),
            memory_used_mb: 1,
            memory_total_mb: 2,
            utilization_gpu: 3,
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["memory_used_MB"], 1);
        assert_eq!(v["memory_total_MB"], 2);
        assert_eq!(v["utilization_gpu"], 3);
    }
}
