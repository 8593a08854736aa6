use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host's default input
/// when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return host
            .default_input_device()
            .context("No default input device");
    };

    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|d| d.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No input device named '{target}'"))
}

/// One line per input device: name, channels, sample rate, and a
/// `[default]` marker.
pub fn available_inputs() -> anyhow::Result<Vec<String>> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host.default_input_device().and_then(|d| d.name().ok());

    let mut device_names = Vec::new();
    for in_device in host
        .input_devices()
        .context("Failed to enumerate input devices")?
    {
        let Ok(d_name) = in_device.name() else {
            continue;
        };
        let mut d = match in_device.default_input_config() {
            Ok(cfg) => format!(
                " * {}({}ch, {}hz)",
                d_name,
                cfg.channels(),
                cfg.sample_rate().0
            ),
            Err(_) => format!(" * {d_name}(no default config)"),
        };
        if default_device.as_deref() == Some(d_name.as_str()) {
            d.push_str(" [default]");
        }
        device_names.push(d);
    }
    Ok(device_names)
}
