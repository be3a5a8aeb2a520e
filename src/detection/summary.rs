//! Helpers around a detection call: turning a text blob into lines and
//! condensing long anomaly lists for downstream consumers.

/// Anomaly lists longer than this are summarized
pub const MAX_ANOMALIES: usize = 100;

/// Lines kept from each end of a summarized list
pub const SAMPLE_SIZE: usize = 25;

/// Split raw log content into lines, dropping blank ones.
///
/// A trailing `\r` is stripped so CRLF files produce the same lines as LF files.
pub fn split_log_content(content: &str) -> Vec<String> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Condense an anomaly list to its first and last `sample` entries when it
/// holds more than `max` lines. Shorter lists are returned unchanged.
pub fn summarize_anomalies(anomalies: &[String], max: usize, sample: usize) -> Vec<String> {
    if anomalies.len() <= max {
        return anomalies.to_vec();
    }

    let sample = sample.min(anomalies.len());
    let mut summary = Vec::with_capacity(sample * 2 + 4);
    summary.push(format!(
        "[SUMMARY] {} anomalies detected in total. Samples follow:",
        anomalies.len()
    ));
    summary.push("--- FIRST ANOMALIES ---".to_string());
    summary.extend_from_slice(&anomalies[..sample]);
    summary.push("--- ( ... truncated ... ) ---".to_string());
    summary.push("--- LAST ANOMALIES ---".to_string());
    summary.extend_from_slice(&anomalies[anomalies.len() - sample..]);
    summary
}
