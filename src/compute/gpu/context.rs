//! Device context: the adapter's device and queue, injected into every
//! engine instance.

use super::EngineError;

/// Texture format of the simulation field.
pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Usages the field format must support on the chosen adapter.
pub fn field_usages() -> wgpu::TextureUsages {
    wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::RENDER_ATTACHMENT
        | wgpu::TextureUsages::COPY_SRC
        | wgpu::TextureUsages::COPY_DST
}

/// A GPU device and its submission queue.
///
/// Handles are reference counted by wgpu, so cloning a context shares the
/// device rather than creating a new one.
#[derive(Clone, Debug)]
pub struct DeviceContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl DeviceContext {
    /// Request a headless high-performance adapter and open a device on it.
    pub async fn headless() -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| EngineError::NoAdapter)?;

        Self::from_adapter(&adapter).await
    }

    /// Open a device on an adapter chosen by the caller, e.g. one compatible
    /// with a window surface.
    pub async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, EngineError> {
        let adapter_info = adapter.get_info();
        check_field_support(adapter)?;

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Reaction-Diffusion GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        log::info!(
            "Using GPU: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }
}

/// The field must be sampled, rendered to, and copied both ways.
fn check_field_support(adapter: &wgpu::Adapter) -> Result<(), EngineError> {
    let allowed = adapter
        .get_texture_format_features(FIELD_FORMAT)
        .allowed_usages;
    let missing = field_usages().difference(allowed);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::DeviceCapability {
            format: FIELD_FORMAT,
            missing,
        })
    }
}
