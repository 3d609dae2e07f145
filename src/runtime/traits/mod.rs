// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ImageOps, ContainerOps, and RuntimeInfo.

mod container;
mod image;
mod runtime_info;
pub(crate) mod sealed;

pub use container::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerOps, ContainerSummary, StateFilter,
};
pub use image::{BuildContext, BuildLogStream, ImageError, ImageOps, ImageSummary};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError, RuntimeMetadata};
