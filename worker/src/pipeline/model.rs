//! Perturbation model warm-load. Spec §4.4 "Startup warm-up": the worker
//! "attempts to warm-load the perturbation model; on warm-load failure the
//! worker falls back to variant (b) (frequency-domain) for subsequent tasks
//! and logs the degradation."
//!
//! `core/mist/mist_v2.py` lazy-loads a frozen Stable Diffusion VAE encoder
//! on first use (`_get_vae_encoder`); there is no such pretrained weight
//! file in this workspace, so the gradient variant here has no external
//! weights to load. `PerturbationModel::warmup` keeps the same shape —
//! an optional weights path checked at startup — so an operator who later
//! points `PERTURBATION_MODEL_PATH` at a real asset gets the same
//! degrade-on-failure behavior without changing the outer loop.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct PerturbationModel {
    degraded: AtomicBool,
}

impl PerturbationModel {
    /// Attempt to warm-load the gradient-variant model. `weights_path`,
    /// when set, must point at a readable file; its contents are otherwise
    /// unused by the deterministic surrogate in `pipeline::perturb`. Always
    /// succeeds (degraded = false) when unset, matching a pure-Rust
    /// deployment with no external weights to fetch.
    pub fn warmup(weights_path: Option<&str>) -> Self {
        let degraded = match weights_path {
            None => false,
            Some(path) => match std::fs::metadata(path) {
                Ok(_) => false,
                Err(e) => {
                    log::warn!(
                        "[startup] perturbation model warm-load failed ({path}: {e}); \
                         falling back to the frequency-domain perturbation variant for all tasks"
                    );
                    true
                }
            },
        };
        Self {
            degraded: AtomicBool::new(degraded),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_path_configured_is_not_degraded() {
        assert!(!PerturbationModel::warmup(None).is_degraded());
    }

    #[test]
    fn missing_weights_file_degrades() {
        assert!(PerturbationModel::warmup(Some("/definitely/not/a/real/path")).is_degraded());
    }
}
