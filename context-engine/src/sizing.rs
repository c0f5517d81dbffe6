//! `SizingController`: computes the safe `window_tokens` for a session, once,
//! at session start. Mid-session resizing is never permitted — only
//! `VRAMMonitor` warnings flow during a session.

use crate::types::{SizingConfig, SizingError, Tier, VRAMSample};
use tracing::warn;

/// Per-model profile: declared maximum context and expected per-token
/// memory footprint in bytes, pre-tabulated the way the teacher tabulates
/// per-model KV-cache costs in its memory estimator.
#[derive(Debug, Clone, Copy)]
pub struct ModelProfile {
    pub max_context: usize,
    pub bytes_per_token: u64,
}

pub struct SizingController {
    config: SizingConfig,
}

impl SizingController {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Computes the largest safe `window_tokens` for a new session, per
    /// §4.5: bounded by the model's declared maximum context, VRAM total
    /// divided by the per-token footprint and the overhead multiplier, and
    /// clamped to an explicit user preference with a visible warning if the
    /// preference is unsafe.
    pub fn compute_window(
        &self,
        profile: ModelProfile,
        vram: VRAMSample,
        pending_window: Option<usize>,
    ) -> (usize, Tier, Option<SizingError>) {
        let vram_ceiling = match vram {
            VRAMSample::Reading(reading) => {
                let usable_bytes = (reading.free_bytes as f64 / self.config.overhead_multiplier) as u64;
                (usable_bytes / profile.bytes_per_token.max(1)) as usize
            }
            VRAMSample::Unknown => {
                warn!("VRAM reading unknown at session start; falling back to conservative default window");
                self.config.conservative_default_window
            }
        };

        let safe_ceiling = vram_ceiling.min(profile.max_context);

        let (window, warning) = match pending_window {
            Some(requested) if requested <= safe_ceiling => (requested, None),
            Some(requested) => (
                safe_ceiling,
                Some(SizingError::ClampedWindow {
                    requested,
                    ceiling: safe_ceiling,
                }),
            ),
            None => (safe_ceiling, None),
        };

        if let Some(ref w) = warning {
            warn!(%w, "requested window clamped to the safe ceiling");
        }

        (window, Tier::for_window_tokens(window), warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::types::VRAMReading;

    fn profile() -> ModelProfile {
        ModelProfile {
            max_context: 32_768,
            bytes_per_token: 128 * 1024,
        }
    }

    #[test]
    fn unknown_reading_falls_back_to_conservative_default() {
        let controller = SizingController::new(SizingConfig::default());
        let (window, _tier, warning) = controller.compute_window(profile(), VRAMSample::Unknown, None);
        assert_eq!(window, SizingConfig::default().conservative_default_window);
        assert!(warning.is_none());
    }

    #[test]
    fn user_preference_wins_when_safe() {
        let controller = SizingController::new(SizingConfig::default());
        let reading = VRAMSample::Reading(VRAMReading {
            total_bytes: 16_000_000_000,
            used_bytes: 0,
            free_bytes: 16_000_000_000,
            sampled_at: Utc::now(),
        });
        let (window, _tier, warning) = controller.compute_window(profile(), reading, Some(8192));
        assert_eq!(window, 8192);
        assert!(warning.is_none());
    }

    #[test]
    fn unsafe_preference_is_clamped_with_a_warning() {
        let controller = SizingController::new(SizingConfig::default());
        let reading = VRAMSample::Reading(VRAMReading {
            total_bytes: 1_000_000,
            used_bytes: 0,
            free_bytes: 1_000_000,
            sampled_at: Utc::now(),
        });
        let (window, _tier, warning) = controller.compute_window(profile(), reading, Some(100_000));
        assert!(window < 100_000);
        assert!(warning.is_some());
    }

    #[test]
    fn tier_is_derived_never_drives_size() {
        let controller = SizingController::new(SizingConfig::default());
        let (window, tier, _) = controller.compute_window(profile(), VRAMSample::Unknown, None);
        assert_eq!(tier, Tier::for_window_tokens(window));
    }
}
