use anyhow::{Result, anyhow, bail};
use log::info;

use crate::shader;

/// Pick an adapter and open a device able to run the batch shader.
///
/// Fails when the adapter cannot index a texture binding array per fragment.
pub async fn request_batch_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow!("failed to find a suitable GPU adapter"))?;

    let required = shader::required_features();
    let missing = required.difference(adapter.features());
    if !missing.is_empty() {
        bail!(
            "adapter {} lacks features needed for batching: {missing:?}",
            adapter.get_info().name
        );
    }

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("batch2d_device"),
                required_features: required,
                required_limits: adapter.limits(),
                ..Default::default()
            },
            None,
        )
        .await
        .map_err(|e| anyhow!("failed to create device: {e}"))?;

    info!(
        "using {} ({:?})",
        adapter.get_info().name,
        adapter.get_info().backend
    );
    Ok((adapter, device, queue))
}
