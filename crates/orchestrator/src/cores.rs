//! Physical core detection for sizing the worker pool

use sysinfo::System;
use tracing::debug;

/// Number of physical cores, falling back to available parallelism
pub fn physical_cores() -> usize {
    resolve_cores(System::new().physical_core_count())
}

/// Prefer the detected physical count; logical cpus only when it is unknown
fn resolve_cores(detected: Option<usize>) -> usize {
    match detected.filter(|n| *n > 0) {
        Some(n) => {
            debug!("Detected {} physical cores", n);
            n
        }
        None => {
            let n = std::thread::available_parallelism().map_or(1, |n| n.get());
            debug!("Physical core count unavailable, using {} logical cpus", n);
            n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_count_used() {
        assert_eq!(resolve_cores(Some(6)), 6);
    }

    #[test]
    fn test_unknown_count_falls_back() {
        assert!(resolve_cores(None) >= 1);
        assert!(resolve_cores(Some(0)) >= 1);
    }

    #[test]
    fn test_physical_cores_positive() {
        assert!(physical_cores() >= 1);
    }
}
