//! Local inference on candle: BERT cross-encoder reranking.

pub mod cross_encoder;
pub mod loader;

pub use candle_core::Device;
pub use cross_encoder::CrossEncoderReranker;

/// Pick the best available device for the enabled backend features.
///
/// Falls back to CPU when the accelerator cannot be initialized.
#[must_use]
pub fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    if let Ok(device) = Device::new_cuda(0) {
        return device;
    }
    #[cfg(feature = "metal")]
    if let Ok(device) = Device::new_metal(0) {
        return device;
    }
    Device::Cpu
}
