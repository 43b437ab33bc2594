//! Adaptive output quality.
//!
//! Re-encoding a low-bitrate source at a high nominal rate only wastes space,
//! so in adaptive mode the requested bitrate is capped at a tier derived from
//! the source's own audio bitrate. Adaptive mode never raises the request.

use audex_common::{AudioFormat, Bitrate};

/// Upper tier handed out for any source above the last step.
pub const TOP_TIER: Bitrate = Bitrate::from_kbps(256);

/// Map a detected source bitrate (bits/sec) to the nearest meaningful tier.
///
/// The thresholds sit slightly above each nominal rate so a 64k stream
/// measured at 64 200 bps still lands on 64k.
pub fn staircase(source_bps: u64) -> Bitrate {
    match source_bps {
        0..=66_000 => Bitrate::from_kbps(64),
        66_001..=98_000 => Bitrate::from_kbps(96),
        98_001..=130_000 => Bitrate::from_kbps(128),
        130_001..=196_000 => Bitrate::from_kbps(192),
        _ => TOP_TIER,
    }
}

/// Effective bitrate for a lossy extraction.
///
/// - not adaptive: `requested`
/// - adaptive, source unknown: `requested`
/// - adaptive, source known: `min(requested, staircase(source))`
pub fn resolve_bitrate(requested: Bitrate, adaptive: bool, source_bps: Option<u64>) -> Bitrate {
    match (adaptive, source_bps) {
        (true, Some(bps)) => requested.min(staircase(bps)),
        _ => requested,
    }
}

/// What the user asked for on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityRequest {
    /// Nominal bitrate (ignored for lossless formats).
    pub requested: Bitrate,
    /// Cap the request by the source bitrate.
    pub adaptive: bool,
    /// Output format.
    pub format: AudioFormat,
}

/// Result of resolving a [`QualityRequest`] against one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityDecision {
    /// Bitrate to pass to the encoder; `None` for lossless formats.
    pub bitrate: Option<Bitrate>,
    /// Whether adaptive mode lowered the request.
    pub adjusted: bool,
}

impl QualityRequest {
    /// Resolve against a probed source bitrate.
    pub fn resolve(&self, source_bps: Option<u64>) -> QualityDecision {
        if self.format.is_lossless() {
            return QualityDecision {
                bitrate: None,
                adjusted: false,
            };
        }

        let effective = resolve_bitrate(self.requested, self.adaptive, source_bps);
        QualityDecision {
            bitrate: Some(effective),
            adjusted: effective != self.requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kbps(v: u64) -> Bitrate {
        Bitrate::from_kbps(v)
    }

    #[test]
    fn test_staircase_boundaries() {
        assert_eq!(staircase(66_000), kbps(64));
        assert_eq!(staircase(66_001), kbps(96));
        assert_eq!(staircase(98_000), kbps(96));
        assert_eq!(staircase(98_001), kbps(128));
        assert_eq!(staircase(130_000), kbps(128));
        assert_eq!(staircase(130_001), kbps(192));
        assert_eq!(staircase(196_000), kbps(192));
        assert_eq!(staircase(196_001), kbps(256));
        assert_eq!(staircase(0), kbps(64));
        assert_eq!(staircase(1_536_000), kbps(256));
    }

    #[test]
    fn test_adaptive_lowers_high_request() {
        assert_eq!(resolve_bitrate(kbps(320), true, Some(96_000)), kbps(96));
    }

    #[test]
    fn test_adaptive_never_raises() {
        assert_eq!(resolve_bitrate(kbps(128), true, Some(256_000)), kbps(128));

        for requested in [64, 96, 128, 192, 256, 320, 500] {
            for source in [8_000, 66_000, 66_001, 110_000, 196_001, 2_000_000] {
                let effective = resolve_bitrate(kbps(requested), true, Some(source));
                assert!(effective <= kbps(requested), "{requested}k / {source}");
            }
        }
    }

    #[test]
    fn test_adaptive_unknown_source_keeps_request() {
        assert_eq!(resolve_bitrate(kbps(192), true, None), kbps(192));
    }

    #[test]
    fn test_fixed_mode_ignores_source() {
        for source in [None, Some(32_000), Some(320_000)] {
            assert_eq!(resolve_bitrate(kbps(192), false, source), kbps(192));
        }
    }

    #[test]
    fn test_request_decision_reports_adjustment() {
        let request = QualityRequest {
            requested: kbps(192),
            adaptive: true,
            format: AudioFormat::Mp3,
        };
        assert_eq!(
            request.resolve(Some(90_000)),
            QualityDecision {
                bitrate: Some(kbps(96)),
                adjusted: true
            }
        );
        assert_eq!(
            request.resolve(Some(400_000)),
            QualityDecision {
                bitrate: Some(kbps(192)),
                adjusted: false
            }
        );
    }

    #[test]
    fn test_lossless_bypasses_resolution() {
        for format in [AudioFormat::Wav, AudioFormat::Flac] {
            let request = QualityRequest {
                requested: kbps(320),
                adaptive: true,
                format,
            };
            assert_eq!(request.resolve(Some(64_000)).bitrate, None);
        }
    }
}
