//! Composite scoring: `score(p) = w_cpu * norm(p.cpu) + w_rss * norm(p.rss /
//! rss_ref)`, where `norm` is the identity function. Only RSS is normalized
//! against a reference (the batch's observed maximum); CPU enters the score
//! as the raw `cpu_percent` it already is.

use pp_common::ProcessInfo;
use pp_config::SamplerConfig;

/// The un-smoothed score for one process against the current batch's peak
/// RSS. `rss_peak` is expected to already be the maximum observed in the
/// batch (zero is treated as "no signal", scoring every process 0 on that
/// dimension rather than dividing by zero).
pub fn raw_score(info: &ProcessInfo, rss_peak: u64, cfg: &SamplerConfig) -> f64 {
    let rss_norm = if rss_peak > 0 {
        info.rss_bytes as f64 / rss_peak as f64
    } else {
        0.0
    };
    cfg.cpu_weight * info.cpu_percent + cfg.rss_weight * rss_norm
}

/// Peak RSS across a batch, used as the RSS normalization reference.
pub fn batch_peaks(batch: &[ProcessInfo]) -> u64 {
    batch.iter().map(|p| p.rss_bytes).max().unwrap_or(0)
}
