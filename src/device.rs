//! Compute device catalog.
//!
//! Accelerator entries come from wgpu adapter enumeration; the CPU entry is
//! always present. Enumeration never fails hard: a machine without any
//! usable accelerator gets a visible sentinel entry instead of an error.

use wgpu::DeviceType;

/// Name reported when adapter enumeration yields no accelerator.
pub const NO_ACCELERATOR: &str = "no accelerator found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Accelerator,
}

/// One entry in the device catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Stable index within the catalog.
    pub id: usize,
    /// Human-readable adapter name.
    pub name: String,
    pub kind: DeviceKind,
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Accelerator => "accelerator",
        };
        write!(f, "[{}] {} ({})", self.id, self.name, kind)
    }
}

/// Enumerate available compute backends: the host CPU, then every
/// accelerator adapter wgpu can see. Appends the [`NO_ACCELERATOR`]
/// sentinel when no accelerator is present.
pub fn list_devices() -> Vec<DeviceDescriptor> {
    let mut devices = vec![DeviceDescriptor {
        id: 0,
        name: "host cpu".to_string(),
        kind: DeviceKind::Cpu,
    }];

    let instance = wgpu::Instance::default();
    let mut found = false;
    for adapter in instance.enumerate_adapters(wgpu::Backends::all()) {
        let info = adapter.get_info();
        // Software rasterizers (llvmpipe, WARP) report DeviceType::Cpu and
        // are not accelerators in any useful sense.
        if info.device_type == DeviceType::Cpu {
            continue;
        }
        found = true;
        devices.push(DeviceDescriptor {
            id: devices.len(),
            name: info.name,
            kind: DeviceKind::Accelerator,
        });
    }

    if !found {
        log::info!("device catalog: no accelerator adapter present");
        devices.push(DeviceDescriptor {
            id: devices.len(),
            name: NO_ACCELERATOR.to_string(),
            kind: DeviceKind::Accelerator,
        });
    }

    devices
}

/// Strip the optional `accelerator:` prefix (any casing) from a device
/// selector.
pub fn strip_selector_prefix(selector: &str) -> &str {
    const PREFIX: &str = "accelerator:";
    let trimmed = selector.trim();
    let bytes = trimmed.as_bytes();
    // A matching prefix is pure ASCII, so slicing at its byte length is
    // always a char boundary.
    if bytes.len() >= PREFIX.len() && bytes[..PREFIX.len()].eq_ignore_ascii_case(PREFIX.as_bytes())
    {
        trimmed[PREFIX.len()..].trim()
    } else {
        trimmed
    }
}

/// True when the selector names the CPU path (or names nothing at all).
pub fn selects_cpu(selector: Option<&str>) -> bool {
    match selector {
        None => true,
        Some(s) => s.trim().to_ascii_lowercase().starts_with("cpu") || s.trim().is_empty(),
    }
}

/// Case-insensitive substring match used to pick an accelerator by name.
pub fn name_matches(selector: &str, adapter_name: &str) -> bool {
    let wanted = strip_selector_prefix(selector).to_ascii_lowercase();
    !wanted.is_empty() && adapter_name.to_ascii_lowercase().contains(&wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_always_lists_cpu_first() {
        let devices = list_devices();
        assert!(!devices.is_empty());
        assert_eq!(devices[0].kind, DeviceKind::Cpu);
        // ids are stable positions
        for (i, d) in devices.iter().enumerate() {
            assert_eq!(d.id, i);
        }
    }

    #[test]
    fn selector_prefix_is_optional_and_case_insensitive() {
        assert_eq!(strip_selector_prefix("accelerator: GeForce"), "GeForce");
        assert_eq!(strip_selector_prefix("ACCELERATOR:radeon"), "radeon");
        assert_eq!(strip_selector_prefix("Accelerator:GeForce"), "GeForce");
        assert_eq!(strip_selector_prefix("aCCeLeRaToR: rtx"), "rtx");
        assert_eq!(strip_selector_prefix("GeForce"), "GeForce");
        assert_eq!(strip_selector_prefix("accel"), "accel");
    }

    #[test]
    fn cpu_selection() {
        assert!(selects_cpu(None));
        assert!(selects_cpu(Some("cpu")));
        assert!(selects_cpu(Some("CPU (host)")));
        assert!(!selects_cpu(Some("GeForce RTX 3060")));
    }

    #[test]
    fn substring_match_ignores_case() {
        assert!(name_matches("geforce", "NVIDIA GeForce RTX 3060"));
        assert!(name_matches("accelerator:RTX", "NVIDIA GeForce RTX 3060"));
        assert!(name_matches("Accelerator:GeForce", "NVIDIA GeForce RTX 3060"));
        assert!(!name_matches("radeon", "NVIDIA GeForce RTX 3060"));
        assert!(!name_matches("", "NVIDIA GeForce RTX 3060"));
    }
}
