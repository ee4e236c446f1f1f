//! CUDA-accelerated stepping backend
//!
//! The kernel works directly on the byte grid: device buffers are
//! `width * height` bytes, each CUDA block is one tile and each thread one
//! cell.
//!
//! Build with: cargo build --release --features cuda
//!
//! Note: Requires NVIDIA GPU and CUDA toolkit installed.

#[cfg(feature = "cuda")]
use crate::engine::{EngineError, EngineResult, LifeKernel};
#[cfg(feature = "cuda")]
use crate::tiling::TileLayout;
#[cfg(feature = "cuda")]
use cudarc::driver::*;
#[cfg(feature = "cuda")]
use std::sync::Arc;

/// Life kernel in CUDA C (compiled at runtime with NVRTC)
#[cfg(feature = "cuda")]
const LIFE_CUDA_KERNEL: &str = r#"
extern "C" __global__ void life_step(
    const unsigned char* cells_in,
    unsigned char* cells_out,
    int width,
    int height
) {
    const int x = blockIdx.x * blockDim.x + threadIdx.x;
    const int y = blockIdx.y * blockDim.y + threadIdx.y;

    // Tiles over-cover the grid when a dimension is not a multiple of the edge
    if (x >= width || y >= height) return;

    const int left = (x + width - 1) % width;
    const int right = (x + 1) % width;
    const int up = (y + height - 1) % height;
    const int down = (y + 1) % height;

    const int row_up = up * width;
    const int row = y * width;
    const int row_down = down * width;

    int n = 0;
    n += cells_in[row_up + left] == 1;
    n += cells_in[row_up + x] == 1;
    n += cells_in[row_up + right] == 1;
    n += cells_in[row + left] == 1;
    n += cells_in[row + right] == 1;
    n += cells_in[row_down + left] == 1;
    n += cells_in[row_down + x] == 1;
    n += cells_in[row_down + right] == 1;

    const bool alive = cells_in[row + x] == 1;
    cells_out[row + x] = (n == 3 || (alive && n == 2)) ? 1 : 0;
}
"#;

/// CUDA-based life stepping engine. Device buffers are released when the
/// engine is dropped.
#[cfg(feature = "cuda")]
pub struct CudaLifeEngine {
    device: Arc<CudaDevice>,
    input_gpu: CudaSlice<u8>,
    output_gpu: CudaSlice<u8>,
    kernel: CudaFunction,
    layout: TileLayout,
}

#[cfg(feature = "cuda")]
impl CudaLifeEngine {
    pub fn new(width: usize, height: usize, max_block_edge: usize) -> EngineResult<Self> {
        let device = CudaDevice::new(0).map_err(|e| EngineError::Unavailable(format!("{:?}", e)))?;

        // 32x32 = 1024 threads, the per-block limit on every current NVIDIA part
        let layout = TileLayout::new(width, height, max_block_edge.min(32));

        let ptx = cudarc::nvrtc::compile_ptx(LIFE_CUDA_KERNEL)
            .map_err(|e| EngineError::Compile(format!("{:?}", e)))?;
        device
            .load_ptx(ptx, "life", &["life_step"])
            .map_err(|e| EngineError::Compile(format!("{:?}", e)))?;
        let kernel = device
            .get_func("life", "life_step")
            .ok_or_else(|| EngineError::Compile("life_step not found in module".to_string()))?;

        let cells = layout.cell_count();
        let input_gpu = device
            .alloc_zeros::<u8>(cells)
            .map_err(|e| EngineError::Allocation(format!("input buffer ({} bytes): {:?}", cells, e)))?;
        let output_gpu = device
            .alloc_zeros::<u8>(cells)
            .map_err(|e| EngineError::Allocation(format!("output buffer ({} bytes): {:?}", cells, e)))?;

        log::info!("CUDA device 0 initialized");
        log::info!("CUDA backend: {}", layout);

        Ok(Self {
            device,
            input_gpu,
            output_gpu,
            kernel,
            layout,
        })
    }
}

#[cfg(feature = "cuda")]
impl LifeKernel for CudaLifeEngine {
    fn name(&self) -> &str {
        "cuda"
    }

    fn layout(&self) -> &TileLayout {
        &self.layout
    }

    fn step(&mut self, input: &[u8], output: &mut [u8]) -> EngineResult<()> {
        assert_eq!(input.len(), self.layout.cell_count(), "input size does not match engine");
        assert_eq!(output.len(), self.layout.cell_count(), "output size does not match engine");

        self.device
            .htod_sync_copy_into(input, &mut self.input_gpu)
            .map_err(|e| EngineError::Transfer(format!("upload: {:?}", e)))?;

        let cfg = LaunchConfig {
            block_dim: (self.layout.block_width as u32, self.layout.block_height as u32, 1),
            grid_dim: (self.layout.tiles_x as u32, self.layout.tiles_y as u32, 1),
            shared_mem_bytes: 0,
        };

        unsafe {
            self.kernel.clone().launch(cfg, (
                &self.input_gpu,
                &mut self.output_gpu,
                self.layout.width as i32,
                self.layout.height as i32,
            ))
        }
        .map_err(|e| EngineError::Launch(format!("{:?}", e)))?;

        // Kernel errors surface at synchronize
        self.device
            .synchronize()
            .map_err(|e| EngineError::Launch(format!("synchronize: {:?}", e)))?;

        self.device
            .dtoh_sync_copy_into(&self.output_gpu, output)
            .map_err(|e| EngineError::Transfer(format!("readback: {:?}", e)))?;
        Ok(())
    }
}

/// Check if CUDA is available
#[cfg(feature = "cuda")]
pub fn cuda_available() -> bool {
    CudaDevice::new(0).is_ok()
}

#[cfg(not(feature = "cuda"))]
pub fn cuda_available() -> bool {
    false
}
