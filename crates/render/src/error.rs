use compute::ComputeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("missing {0} texture")]
    MissingTexture(&'static str),
    #[error("render_frame called before set_parameters")]
    ParametersNotStaged,
    #[error("failed to allocate {width}x{height} render target")]
    TargetAllocation {
        width: u32,
        height: u32,
        #[source]
        source: ComputeError,
    },
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
