//! Choosing between GPU and CPU inference.

use clap::ValueEnum;

use crate::prelude::*;

/// Which device the user asked for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum DevicePreference {
    /// Use the GPU if the worker reports a usable one, otherwise the CPU.
    #[default]
    Auto,
    /// Always use the GPU.
    Gpu,
    /// Always use the CPU.
    Cpu,
}

/// The device the engine actually runs on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Gpu,
    Cpu,
}

/// What the worker's inference runtime reports about accelerators.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct AcceleratorProbe {
    /// Was the runtime built with accelerator support?
    pub accelerator_available: bool,

    /// How many accelerator devices are visible.
    #[serde(default)]
    pub accelerator_count: u32,
}

/// Pick a device. `Auto` needs both runtime support and at least one device
/// before it will use the GPU.
pub fn select_device(preference: DevicePreference, probe: &AcceleratorProbe) -> Device {
    match preference {
        DevicePreference::Gpu => Device::Gpu,
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Auto
            if probe.accelerator_available && probe.accelerator_count > 0 =>
        {
            Device::Gpu
        }
        DevicePreference::Auto => Device::Cpu,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(accelerator_available: bool, accelerator_count: u32) -> AcceleratorProbe {
        AcceleratorProbe {
            accelerator_available,
            accelerator_count,
        }
    }

    #[test]
    fn auto_prefers_gpu_when_present() {
        assert_eq!(
            select_device(DevicePreference::Auto, &probe(true, 2)),
            Device::Gpu
        );
    }

    #[test]
    fn auto_falls_back_to_cpu() {
        // Built with CUDA, but no card installed.
        assert_eq!(
            select_device(DevicePreference::Auto, &probe(true, 0)),
            Device::Cpu
        );
        // Devices visible, but runtime built without support.
        assert_eq!(
            select_device(DevicePreference::Auto, &probe(false, 1)),
            Device::Cpu
        );
    }

    #[test]
    fn explicit_preference_wins() {
        assert_eq!(
            select_device(DevicePreference::Gpu, &probe(false, 0)),
            Device::Gpu
        );
        assert_eq!(
            select_device(DevicePreference::Cpu, &probe(true, 4)),
            Device::Cpu
        );
    }

    #[test]
    fn probe_count_is_optional() {
        let probe: AcceleratorProbe =
            serde_json::from_value(json!({"accelerator_available": true})).unwrap();
        assert_eq!(probe.accelerator_count, 0);
    }
}
