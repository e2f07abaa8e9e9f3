use anyhow::{anyhow, Result};
use candle::Device;
use tracing::{info, warn};

/// Resolves a device preference such as `cpu`, `cuda` or `cuda:1`.
///
/// `None` or `auto` tries CUDA 0 and falls back to the CPU.
pub fn select_device(preference: Option<&str>) -> Result<Device> {
    let Some(raw) = preference.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(auto_device());
    };
    let lower = raw.to_ascii_lowercase();

    if lower == "auto" {
        Ok(auto_device())
    } else if lower == "cpu" {
        Ok(Device::Cpu)
    } else if lower.starts_with("cuda") || lower.starts_with("gpu") {
        let ordinal = raw
            .split(':')
            .nth(1)
            .and_then(|part| part.parse::<usize>().ok())
            .unwrap_or(0);
        Device::new_cuda(ordinal).map_err(|err| {
            anyhow!(
                "requested CUDA device {ordinal} but initialization failed ({err}). Build with \
                 the `classifier-cuda` feature and ensure CUDA libraries are available."
            )
        })
    } else {
        warn!("unrecognized device preference '{raw}', defaulting to auto");
        Ok(auto_device())
    }
}

fn auto_device() -> Device {
    match Device::new_cuda(0) {
        Ok(device) => {
            info!("emotion classifier → CUDA:0");
            device
        }
        Err(_) => {
            info!("emotion classifier → CPU");
            Device::Cpu
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_cpu() {
        assert!(matches!(select_device(Some("cpu")).unwrap(), Device::Cpu));
        assert!(matches!(select_device(Some(" CPU ")).unwrap(), Device::Cpu));
    }

    #[test]
    fn unknown_preference_falls_back_to_auto() {
        assert!(select_device(Some("tpu")).is_ok());
        assert!(select_device(None).is_ok());
    }
}
