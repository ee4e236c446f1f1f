//! Step Engine abstraction and backend selection
//!
//! A `LifeKernel` owns its device-resident input/output buffers for its
//! whole lifetime (released on drop) and turns one host generation into the
//! next with a single synchronous `step` call.

use crate::tiling::TileLayout;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Only the accelerator backends raise the device-side variants
#[cfg_attr(not(any(feature = "cuda", feature = "wgpu-compute")), allow(dead_code))]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("device allocation failed: {0}")]
    Allocation(String),

    #[error("kernel compilation failed: {0}")]
    Compile(String),

    #[error("kernel launch failed: {0}")]
    Launch(String),

    #[error("host/device transfer failed: {0}")]
    Transfer(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// One generation step on some compute device.
///
/// `input` and `output` must both hold exactly `layout().cell_count()`
/// bytes; anything else is a caller bug and panics. On `Ok`, `output` is
/// fully populated with the next generation.
pub trait LifeKernel {
    /// Backend name for display (e.g. "cpu", "wgpu (NVIDIA ...)")
    fn name(&self) -> &str;

    fn layout(&self) -> &TileLayout;

    fn step(&mut self, input: &[u8], output: &mut [u8]) -> EngineResult<()>;
}

/// Compute backend requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Try CUDA, then wgpu, then CPU
    Auto,
    Cuda,
    Wgpu,
    Cpu,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "cuda" => Ok(Backend::Cuda),
            "wgpu" | "gpu" => Ok(Backend::Wgpu),
            "cpu" => Ok(Backend::Cpu),
            other => Err(format!("unknown backend '{}' (expected auto, cuda, wgpu or cpu)", other)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Backend::Auto => "auto",
            Backend::Cuda => "cuda",
            Backend::Wgpu => "wgpu",
            Backend::Cpu => "cpu",
        };
        f.write_str(s)
    }
}

/// Construct the engine for `backend`.
///
/// An explicitly requested backend that fails to initialise is an error.
/// `Auto` walks cuda → wgpu → cpu and only fails if the CPU engine does.
pub fn create_engine(
    backend: Backend,
    width: usize,
    height: usize,
    max_block_edge: usize,
) -> EngineResult<Box<dyn LifeKernel>> {
    match backend {
        Backend::Cuda => create_cuda(width, height, max_block_edge),
        Backend::Wgpu => create_wgpu(width, height, max_block_edge),
        Backend::Cpu => Ok(Box::new(crate::cpu::CpuLifeEngine::new(width, height, max_block_edge))),
        Backend::Auto => {
            match create_cuda(width, height, max_block_edge) {
                Ok(engine) => return Ok(engine),
                Err(e) => log::warn!("CUDA backend not used: {}", e),
            }
            match create_wgpu(width, height, max_block_edge) {
                Ok(engine) => return Ok(engine),
                Err(e) => log::warn!("wgpu backend not used: {}", e),
            }
            log::info!("Falling back to CPU backend");
            Ok(Box::new(crate::cpu::CpuLifeEngine::new(width, height, max_block_edge)))
        }
    }
}

#[cfg(feature = "cuda")]
fn create_cuda(width: usize, height: usize, max_block_edge: usize) -> EngineResult<Box<dyn LifeKernel>> {
    Ok(Box::new(crate::cuda::CudaLifeEngine::new(width, height, max_block_edge)?))
}

#[cfg(not(feature = "cuda"))]
fn create_cuda(_width: usize, _height: usize, _max_block_edge: usize) -> EngineResult<Box<dyn LifeKernel>> {
    Err(EngineError::Unavailable(
        "not compiled with CUDA support (build with --features cuda)".to_string(),
    ))
}

#[cfg(feature = "wgpu-compute")]
fn create_wgpu(width: usize, height: usize, max_block_edge: usize) -> EngineResult<Box<dyn LifeKernel>> {
    Ok(Box::new(crate::gpu::WgpuLifeEngine::new(width, height, max_block_edge)?))
}

#[cfg(not(feature = "wgpu-compute"))]
fn create_wgpu(_width: usize, _height: usize, _max_block_edge: usize) -> EngineResult<Box<dyn LifeKernel>> {
    Err(EngineError::Unavailable(
        "not compiled with wgpu support (build with --features wgpu-compute)".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("auto".parse::<Backend>().unwrap(), Backend::Auto);
        assert_eq!("CUDA".parse::<Backend>().unwrap(), Backend::Cuda);
        assert_eq!("wgpu".parse::<Backend>().unwrap(), Backend::Wgpu);
        assert_eq!("cpu".parse::<Backend>().unwrap(), Backend::Cpu);
        assert!("metal".parse::<Backend>().is_err());
        assert_eq!(Backend::Wgpu.to_string(), "wgpu");
    }

    #[test]
    fn test_create_cpu_engine() {
        let engine = create_engine(Backend::Cpu, 50, 20, 32).unwrap();
        assert_eq!(engine.name(), "cpu");
        assert_eq!(engine.layout().cell_count(), 1000);
    }

    #[test]
    fn test_auto_always_yields_engine() {
        let mut engine = create_engine(Backend::Auto, 8, 8, 32).unwrap();
        let input = vec![0u8; 64];
        let mut output = vec![1u8; 64];
        engine.step(&input, &mut output).unwrap();
        assert!(output.iter().all(|&c| c == 0));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_without_feature_is_unavailable() {
        assert!(matches!(
            create_engine(Backend::Cuda, 4, 4, 32),
            Err(EngineError::Unavailable(_))
        ));
    }
}
