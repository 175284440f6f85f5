//! Size gate in front of the chat transport.

use crate::core::types::Artifact;
use serde::{Deserialize, Serialize};

/// Telegram Bot API limit for bot uploads via the public API.
pub const TELEGRAM_UPLOAD_LIMIT_BYTES: u64 = 50 * 1024 * 1024;

/// Bitrates tried, highest first, when an artifact is too large.
pub const DOWNGRADE_LADDER_KBPS: [u32; 6] = [160, 128, 96, 64, 48, 32];

/// What to do with an artifact over the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OversizePolicy {
    /// Tell the user the file is too large
    #[default]
    Reject,
    /// Re-encode once at a lower bitrate, reject if still too large
    Downgrade,
}

/// Gate decision for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    SendAudio,
    Downgrade { target_bitrate_kbps: u32 },
    Reject { size: u64, limit: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryGate {
    max_upload_bytes: u64,
    policy: OversizePolicy,
}

impl DeliveryGate {
    pub fn new(max_upload_bytes: u64, policy: OversizePolicy) -> Self {
        Self {
            max_upload_bytes,
            policy,
        }
    }

    pub fn limit(&self) -> u64 {
        self.max_upload_bytes
    }

    /// `size == limit` still fits.
    pub fn fits(&self, size_bytes: u64) -> bool {
        size_bytes <= self.max_upload_bytes
    }

    /// Decision for a freshly fetched artifact.
    pub fn evaluate(&self, artifact: &Artifact) -> GateDecision {
        if self.fits(artifact.size_bytes) {
            return GateDecision::SendAudio;
        }
        if self.policy == OversizePolicy::Downgrade {
            if let Some(target) = pick_downgrade_bitrate(artifact.size_bytes, artifact.bitrate_kbps, self.max_upload_bytes)
            {
                return GateDecision::Downgrade {
                    target_bitrate_kbps: target,
                };
            }
            log::info!(
                "No bitrate on the ladder brings {} bytes at {} kbps under {}",
                artifact.size_bytes,
                artifact.bitrate_kbps,
                self.max_upload_bytes
            );
        }
        self.reject(artifact.size_bytes)
    }

    /// Decision for an artifact that was already downgraded: never downgrades twice.
    pub fn evaluate_final(&self, artifact: &Artifact) -> GateDecision {
        if self.fits(artifact.size_bytes) {
            GateDecision::SendAudio
        } else {
            self.reject(artifact.size_bytes)
        }
    }

    fn reject(&self, size: u64) -> GateDecision {
        GateDecision::Reject {
            size,
            limit: self.max_upload_bytes,
        }
    }
}

/// Highest ladder bitrate below `current_kbps` whose estimated size fits.
///
/// Size is assumed to scale linearly with bitrate, which holds for CBR.
pub fn pick_downgrade_bitrate(size_bytes: u64, current_kbps: u32, limit: u64) -> Option<u32> {
    if current_kbps == 0 {
        return None;
    }
    DOWNGRADE_LADDER_KBPS
        .iter()
        .copied()
        .filter(|target| *target < current_kbps)
        .find(|target| estimate_size(size_bytes, current_kbps, *target) <= limit)
}

fn estimate_size(size_bytes: u64, current_kbps: u32, target_kbps: u32) -> u64 {
    let scaled = u128::from(size_bytes) * u128::from(target_kbps) / u128::from(current_kbps);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}
