// =============================================================================
// QUAD SANDBOX - Batched quads and a compute round trip on raw Vulkan
// =============================================================================
//
// A small real-time sandbox: one window, one batched quad program, one
// compute program.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (input, redraw requests)                      │
// │    └── App                                                      │
// │          ├── ComputeProgram (set -> dispatch -> wait -> read)   │
// │          ├── BatchRenderer  (clear -> add_square* -> render)    │
// │          │     └── FrameSurface (records into a command buffer) │
// │          └── Vulkan Device + Swapchain                          │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Pick up shader edits (hot reload)
// 2. Compute round trip: dispatch, wait, read back
// 3. Wait for this frame slot, acquire a swapchain image
// 4. Record: clear, batch all squares, one indexed draw
// 5. Submit and present
//
// =============================================================================

mod backend;
mod batch;
mod config;
mod math;
mod watch;

use anyhow::{Context, Result};
use ash::vk;
use backend::{ComputeProgram, FrameSlot, FrameSurface, Program, RenderPass, Swapchain, VulkanDevice, WorkGrid};
use batch::BatchRenderer;
use config::{Config, SceneConfig};
use glam::{UVec3, Vec2, Vec3};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use watch::ShaderWatcher;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging(&config)?;
    log::info!("Starting quad sandbox");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// Initialize logging, optionally into a file instead of stderr
fn init_logging(config: &Config) -> Result<()> {
    use env_logger::{Builder, Env, Target};

    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if config.debug.log_to_file {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
            .with_context(|| format!("Failed to open log file {:?}", config.debug.log_file))?;

        writeln!(file, "=== Quad Sandbox Log ===")?;
        writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
        writeln!(file)?;

        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Queue this frame's squares, swaying horizontally over time
fn build_scene(batch: &mut BatchRenderer, scene: &SceneConfig, elapsed: f32) {
    let x_offset = (elapsed * scene.sway_speed).sin() * scene.sway_amplitude;

    for square in &scene.squares {
        let position = Vec2::from(square.position) + Vec2::new(x_offset, 0.0);
        batch.add_square(position, UVec3::from(square.color), square.size);
    }
}

/// Render read-back compute values as one space-separated line
fn format_values(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Main application struct holding all Vulkan resources.
///
/// GPU objects are released in `Drop` in dependency order; the device
/// itself goes last because every wrapper holds an `Arc` to it.
pub struct App {
    // ─────────────────────────────────────────────────────────────────────────
    // CONFIGURATION
    // ─────────────────────────────────────────────────────────────────────────
    config: Config,

    // ─────────────────────────────────────────────────────────────────────────
    // WINDOW & SURFACE
    // ─────────────────────────────────────────────────────────────────────────
    window: Option<Arc<Window>>,
    surface: Option<vk::SurfaceKHR>,
    surface_loader: Option<ash::extensions::khr::Surface>,
    is_fullscreen: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // VULKAN CORE
    // ─────────────────────────────────────────────────────────────────────────
    device: Option<Arc<VulkanDevice>>,
    swapchain: Option<Swapchain>,
    render_pass: Option<RenderPass>,

    // ─────────────────────────────────────────────────────────────────────────
    // PROGRAMS
    // ─────────────────────────────────────────────────────────────────────────
    program: Option<Program>,
    compute: Option<ComputeProgram>,
    watcher: Option<ShaderWatcher>,

    // ─────────────────────────────────────────────────────────────────────────
    // FRAMES IN FLIGHT
    // ─────────────────────────────────────────────────────────────────────────
    command_pool: Option<vk::CommandPool>,
    /// Command buffer, sync objects and geometry buffers per slot
    frames: Vec<FrameSlot>,
    /// Which slot we're currently using (0 to max_frames_in_flight-1)
    current_frame: usize,
    wait_stages: [vk::PipelineStageFlags; 1],

    // ─────────────────────────────────────────────────────────────────────────
    // SCENE
    // ─────────────────────────────────────────────────────────────────────────
    batch: BatchRenderer,
    started: Instant,

    // ─────────────────────────────────────────────────────────────────────────
    // STATE FLAGS
    // ─────────────────────────────────────────────────────────────────────────
    /// Set to true when window is resized - triggers swapchain recreation
    pub needs_resize: bool,
    /// Set to true when window is minimized (size = 0) - skip rendering
    pub is_minimized: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // FPS TRACKING
    // ─────────────────────────────────────────────────────────────────────────
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    pub fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let now = Instant::now();
        Self {
            config,
            window: None,
            surface: None,
            surface_loader: None,
            is_fullscreen,
            device: None,
            swapchain: None,
            render_pass: None,
            program: None,
            compute: None,
            watcher: None,
            command_pool: None,
            frames: Vec::new(),
            current_frame: 0,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            batch: BatchRenderer::new(),
            started: now,
            needs_resize: false,
            is_minimized: false,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Initialize all Vulkan resources.
    ///
    /// This is called once when the window is created. It sets up:
    /// 1. Vulkan device and window surface
    /// 2. Frame slots (command buffers, sync, geometry buffers)
    /// 3. Swapchain, render pass and the quad program
    /// 4. The compute program and shader watcher
    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        use winit::raw_window_handle_05::{HasRawDisplayHandle, HasRawWindowHandle};

        log::info!("Initializing Vulkan...");

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Device and surface
        // ─────────────────────────────────────────────────────────────────────
        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let display_handle = window.raw_display_handle();
        let device = VulkanDevice::new(&self.config.window.title, enable_validation, display_handle)?;

        let surface = unsafe {
            ash_window::create_surface(
                &device.entry,
                &device.instance,
                display_handle,
                window.raw_window_handle(),
                None,
            )
        }
        .context("Failed to create window surface")?;
        let surface_loader = ash::extensions::khr::Surface::new(&device.entry, &device.instance);

        // Store before anything can fail, so Drop releases the surface
        self.device = Some(device.clone());
        self.surface = Some(surface);
        self.surface_loader = Some(surface_loader);

        let surface_support = unsafe {
            self.surface_loader
                .as_ref()
                .context("Surface loader not initialized")?
                .get_physical_device_surface_support(device.physical_device, device.queue_family, surface)?
        };

        if !surface_support {
            anyhow::bail!("GPU doesn't support presenting to this surface");
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Frame slots
        // ─────────────────────────────────────────────────────────────────────
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.queue_family)
            // RESET: every frame re-records its own buffer
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None)? };
        self.command_pool = Some(command_pool);

        let max_frames = self.config.graphics.max_frames_in_flight;
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(max_frames as u32);
        let command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info)? };

        self.frames = command_buffers
            .into_iter()
            .map(|cmd| FrameSlot::new(device.clone(), cmd))
            .collect::<Result<Vec<_>>>()?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Swapchain, render pass, quad program
        // ─────────────────────────────────────────────────────────────────────
        self.create_swapchain_resources(window)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Compute program and hot reload
        // ─────────────────────────────────────────────────────────────────────
        if self.config.compute.enabled {
            let grid = WorkGrid::new(self.config.compute.width, self.config.compute.height);
            let mut compute = ComputeProgram::new(device.clone(), &self.config.shaders.compute, grid)?;

            let seed: Vec<f32> = (0..grid.len()).map(|i| i as f32).collect();
            compute.set_values(&seed)?;
            self.compute = Some(compute);
        }

        if self.config.shaders.hot_reload {
            let files = [self.config.shaders.vertex.as_path(), self.config.shaders.fragment.as_path()];
            match ShaderWatcher::new(&files) {
                Ok(watcher) => self.watcher = Some(watcher),
                Err(e) => log::warn!("Shader hot reload disabled: {:#}", e),
            }
        }

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    /// Create swapchain, framebuffers and (if needed) render pass + program.
    ///
    /// This is separated from init_vulkan because it needs to be called
    /// again when the window is resized.
    fn create_swapchain_resources(&mut self, window: &Window) -> Result<()> {
        let device = self.device.clone()
            .context("Device not initialized")?;
        let surface = self.surface
            .context("Surface not initialized")?;
        let surface_loader = self.surface_loader.as_ref()
            .context("Surface loader not initialized")?;

        let size = window.inner_size();

        // Don't create swapchain if window is minimized (size = 0)
        if size.width == 0 || size.height == 0 {
            self.is_minimized = true;
            return Ok(());
        }
        self.is_minimized = false;

        // The surface can only have one swapchain at a time
        self.swapchain = None;

        let mut swapchain = Swapchain::new(
            device.clone(),
            surface,
            surface_loader,
            size.width,
            size.height,
            self.config.get_present_mode(),
        )?;

        // Render pass (and the program built against it) follow the image format
        if self.render_pass.as_ref().map(|rp| rp.format) != Some(swapchain.format) {
            if self.render_pass.is_some() {
                log::info!("Surface format changed to {:?}, rebuilding render pass", swapchain.format);
            }
            self.program = None;
            self.render_pass = Some(RenderPass::new(device, swapchain.format)?);
        }

        let render_pass = self.render_pass.as_ref()
            .context("Render pass not initialized")?;
        swapchain.create_framebuffers(render_pass)?;
        self.swapchain = Some(swapchain);

        if self.program.is_none() {
            self.program = Some(self.build_program()?);
        }

        self.needs_resize = false;
        Ok(())
    }

    /// Compile the quad program against the current render pass
    fn build_program(&self) -> Result<Program> {
        let device = self.device.as_ref()
            .context("Device not initialized")?;
        let render_pass = self.render_pass.as_ref()
            .context("Render pass not initialized")?;

        let program = Program::from_files(
            device.clone(),
            render_pass,
            &self.config.shaders.vertex,
            &self.config.shaders.fragment,
        )?;
        Ok(program)
    }

    /// Recreate swapchain after window resize.
    fn recreate_swapchain(&mut self) -> Result<()> {
        // Wait for GPU to finish all work before destroying resources
        if let Some(ref device) = self.device {
            device.wait_idle()?;
        }

        let window = self.window.clone();
        if let Some(ref win) = window {
            self.create_swapchain_resources(win)?;
        }

        Ok(())
    }

    // =========================================================================
    // PER-FRAME WORK
    // =========================================================================

    /// Swap in a fresh quad program if its sources changed.
    ///
    /// A broken edit is logged and the previous program keeps drawing.
    fn reload_shaders(&mut self) {
        let changed = self.watcher.as_ref().is_some_and(|w| w.poll());
        if !changed {
            return;
        }

        log::info!("Shader sources changed, rebuilding program");
        match self.build_program() {
            Ok(program) => {
                // The old pipeline may still be referenced by frames in flight
                if let Some(ref device) = self.device {
                    if let Err(e) = device.wait_idle() {
                        log::error!("wait_idle before program swap failed: {:?}", e);
                    }
                }
                self.program = Some(program);
            }
            Err(e) => {
                log::error!("Shader reload failed, keeping previous program: {:#}", e);
            }
        }
    }

    /// One synchronous compute round trip
    fn run_compute(&mut self) -> Result<()> {
        let Some(compute) = self.compute.as_mut() else {
            return Ok(());
        };

        compute.dispatch()?;
        compute.wait()?;
        let values = compute.get_values()?;

        if self.config.compute.print_values {
            log::info!("{}", format_values(&values));
        }
        Ok(())
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Render a single frame.
    ///
    /// FRAME TIMELINE:
    /// ┌──────────────────────────────────────────────────────────────────────┐
    /// │  compute ─> wait_fence ─> acquire ─> record ─> submit ─> present     │
    /// │                                                                      │
    /// │  (round     (slot is     (image     (batch:    (GPU      (display    │
    /// │   trip)      free)        ready)     1 draw)    works)    shows)     │
    /// └──────────────────────────────────────────────────────────────────────┘
    pub fn render_frame(&mut self) -> Result<bool> {
        // Skip rendering if minimized
        if self.is_minimized {
            return Ok(false);
        }

        // Handle resize if needed
        if self.needs_resize {
            self.recreate_swapchain()?;
            if self.is_minimized {
                return Ok(false);
            }
        }

        self.reload_shaders();
        self.run_compute()?;

        let device = self.device.clone()
            .context("Device not initialized")?;
        let swapchain = self.swapchain.as_ref()
            .context("Swapchain not initialized")?;
        let render_pass = self.render_pass.as_ref()
            .context("Render pass not initialized")?
            .handle;
        let program = self.program.as_ref()
            .context("Program not initialized")?;
        let slot_index = self.current_frame;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Wait until the GPU is done with this slot
        // ─────────────────────────────────────────────────────────────────────
        self.frames[slot_index].sync.wait()?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Acquire next swapchain image
        // ─────────────────────────────────────────────────────────────────────
        let acquired = swapchain.acquire_next_image(
            u64::MAX,
            self.frames[slot_index].sync.image_available,
        )?;

        let image_index = match acquired {
            Some((index, suboptimal)) => {
                // Suboptimal means swapchain still works but should be recreated
                if suboptimal {
                    self.needs_resize = true;
                }
                index
            }
            None => {
                self.needs_resize = true;
                return Ok(false);
            }
        };

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Record this frame's batch
        // ─────────────────────────────────────────────────────────────────────
        let background = Vec3::from(self.config.graphics.clear_color);
        let elapsed = self.started.elapsed().as_secs_f32();

        let recorded = FrameSurface::begin(
            &device,
            &mut self.frames[slot_index],
            render_pass,
            swapchain.framebuffers[image_index as usize],
            swapchain.extent,
            background,
        )
        .and_then(|mut surface| {
            self.batch.clear(&mut surface, background);
            build_scene(&mut self.batch, &self.config.scene, elapsed);
            self.batch.render(&mut surface, program)?;
            surface.finish()
        });

        let cmd = match recorded {
            Ok(cmd) => cmd,
            Err(e) => {
                // The acquired image's semaphore is signaled; consume it
                // before this slot acquires again, and drop the image with
                // the swapchain.
                self.needs_resize = true;
                self.frames[slot_index].sync.retire(&self.wait_stages)?;
                return Err(e);
            }
        };

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Submit command buffer
        // ─────────────────────────────────────────────────────────────────────
        let sync = &self.frames[slot_index].sync;
        let wait_semaphores = [sync.image_available];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)      // Wait for image to be available
            .wait_dst_stage_mask(&self.wait_stages) // Which stage waits
            .command_buffers(&command_buffers)      // Commands to execute
            .signal_semaphores(&signal_semaphores); // Signal when done

        // Only re-arm the fence once a submit is certain to follow
        sync.reset()?;
        unsafe {
            device.device.queue_submit(
                device.queue,
                &[submit_info.build()],
                sync.in_flight_fence, // Signal this fence when GPU is done
            )?;
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Present the image
        // ─────────────────────────────────────────────────────────────────────
        match swapchain.present(device.queue, image_index, &[sync.render_finished]) {
            Ok(suboptimal) => {
                if suboptimal {
                    self.needs_resize = true;
                }
            }
            Err(e) => {
                log::warn!("Present failed, recreating swapchain: {:?}", e);
                self.needs_resize = true;
            }
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 6: Advance to next frame
        // ─────────────────────────────────────────────────────────────────────
        self.current_frame = (self.current_frame + 1) % self.frames.len();

        Ok(true)
    }

    // =========================================================================
    // FULLSCREEN TOGGLE
    // =========================================================================

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }

            self.needs_resize = true;
        }
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    pub fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        if now.duration_since(self.last_fps_update).as_secs_f32() >= 1.0 {
            let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms) - {} quads",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0,
                    self.batch.shape_count()
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            log::error!("Failed to initialize Vulkan: {:#}", e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    /// Handle window events.
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                if let Some(ref device) = self.device {
                    let _ = device.wait_idle();
                }
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                if size.width == 0 || size.height == 0 {
                    self.is_minimized = true;
                } else {
                    self.is_minimized = false;
                    self.needs_resize = true;
                }
            }

            WindowEvent::RedrawRequested => {
                match self.render_frame() {
                    Ok(rendered) => {
                        if rendered {
                            self.update_fps();
                        }
                    }
                    Err(e) => {
                        log::error!("Render error: {:#}", e);
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        match key {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                event_loop.exit();
                            }
                            KeyCode::F11 => {
                                self.toggle_fullscreen();
                            }
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws: the scene animates every frame.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        let Some(device) = self.device.clone() else {
            return;
        };

        // Wait for GPU to finish before destroying anything
        let _ = device.wait_idle();

        // Destroy in reverse order of creation
        self.watcher = None;
        self.frames.clear();
        if let Some(pool) = self.command_pool.take() {
            // Also frees the frame command buffers
            unsafe { device.device.destroy_command_pool(pool, None) };
        }
        self.compute = None;
        self.program = None;
        // Swapchain must go before the surface it presents to
        self.swapchain = None;
        self.render_pass = None;

        if let (Some(surface), Some(loader)) = (self.surface.take(), self.surface_loader.as_ref()) {
            unsafe { loader.destroy_surface(surface, None) };
        }

        // Last Arc: destroys the allocator, device and instance
        self.device = None;
        drop(device);

        log::info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SquareConfig;

    fn scene() -> SceneConfig {
        SceneConfig::default()
    }

    #[test]
    fn scene_without_sway_uses_configured_positions() {
        let mut batch = BatchRenderer::new();
        build_scene(&mut batch, &scene(), 0.0);

        assert_eq!(batch.shape_count(), 3);
        let v = batch.vertices();
        // second square: top-left at (0, 0.5), green
        assert_eq!(&v[20..25], &[0.0, 0.5, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn scene_sways_every_square_together() {
        let mut batch = BatchRenderer::new();
        let scene = scene();
        // sin(2 * pi/4) = 1 -> full amplitude
        build_scene(&mut batch, &scene, std::f32::consts::FRAC_PI_4);

        for quad in batch.vertices().chunks(20) {
            assert!((quad[0] - 0.2).abs() < 1e-5);
        }
    }

    #[test]
    fn scene_passes_colors_and_sizes_through() {
        let mut batch = BatchRenderer::new();
        let scene = SceneConfig {
            sway_amplitude: 0.0,
            sway_speed: 1.0,
            squares: vec![SquareConfig {
                position: [-1.0, 1.0],
                color: [0, 0, 255],
                size: 0.5,
            }],
        };
        build_scene(&mut batch, &scene, 3.0);

        let v = batch.vertices();
        // bottom-right corner
        assert_eq!(&v[15..20], &[-0.5, 0.5, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn compute_values_format_as_one_line() {
        assert_eq!(format_values(&[0.0, 1.5, 2.0]), "0 1.5 2");
        assert_eq!(format_values(&[]), "");
    }
}
