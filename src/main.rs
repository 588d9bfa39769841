use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use dejong_attractor::{ControlKey, DensityPoint, Engine, EngineConfig};
use macroquad::prelude::*;
use tracing::{debug, info};

const LABEL_FONT_SIZE: f32 = 18.0;
const METRICS_INTERVAL: f64 = 5.0;  // Seconds between performance log lines

#[derive(Parser, Debug, Clone)]
#[command(name = "dejong-attractor")]
#[command(about = "Interactive Peter de Jong attractor rendered as a density field")]
struct Cli {
    /// Density grid and window width in pixels
    #[arg(long, default_value_t = 1280)]
    width: usize,

    /// Density grid and window height in pixels
    #[arg(long, default_value_t = 720)]
    height: usize,

    /// Number of trajectory samplers per generation
    #[arg(long, default_value_t = 7)]
    workers: usize,

    /// Per-worker counter value at which sampling stops
    #[arg(long, default_value_t = 32767)]
    saturation_cap: u16,

    /// Minimum generation runtime before input may preempt it
    #[arg(long, default_value_t = 33)]
    min_generation_ms: u64,

    /// Map iterations between termination checks
    #[arg(long, default_value_t = 8192)]
    batch_size: usize,

    /// Initial jitter spread (Up/Down adjust it)
    #[arg(long, default_value_t = 3.3)]
    sample_spread: f64,

    /// Initial pointer sensitivity (Left/Right adjust it)
    #[arg(long, default_value_t = 0.02)]
    sensitivity: f64,

    /// Density redraw rate in frames per second
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            width: self.width,
            height: self.height,
            workers: self.workers,
            saturation_cap: self.saturation_cap,
            min_generation_time: Duration::from_millis(self.min_generation_ms),
            batch_size: self.batch_size,
            sample_spread: self.sample_spread,
            sensitivity: self.sensitivity,
            ..EngineConfig::default()
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.engine_config();
    ensure!(
        config.width <= u16::MAX as usize && config.height <= u16::MAX as usize,
        "window dimensions must fit in 16 bits"
    );
    ensure!(cli.fps.is_finite() && cli.fps > 0.0, "fps must be positive");

    let conf = window_conf(&config);
    let engine = Engine::start(config).context("could not start density engine")?;
    info!("Starting de Jong attractor");
    macroquad::Window::from_config(conf, run(engine, cli.fps));
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn window_conf(config: &EngineConfig) -> Conf {
    Conf {
        window_title: "deJong".to_owned(),
        window_width: config.width as i32,
        window_height: config.height as i32,
        ..Default::default()
    }
}

fn draw_command_summary() {
    let y_start = 50.0;
    let line_height = 20.0;
    let x_pos = 10.0;

    draw_text("Up / Down     - Widen / narrow the sample spread", x_pos, y_start, 20.0, WHITE);
    draw_text("Left / Right  - Lower / raise pointer sensitivity", x_pos, y_start + line_height, 20.0, WHITE);
    draw_text("Mouse         - Steer the a, b parameters", x_pos, y_start + line_height * 2.0, 20.0, WHITE);
    draw_text("/             - Toggle help display", x_pos, y_start + line_height * 3.0, 20.0, WHITE);
    draw_text("Esc           - Quit program", x_pos, y_start + line_height * 4.0, 20.0, WHITE);
}

fn draw_parameters_label(label: &str) {
    let dims = measure_text(label, None, LABEL_FONT_SIZE as u16, 1.0);
    let padding = 8.0;
    // Semi-transparent backing box
    draw_rectangle(5.0, 5.0, dims.width + padding * 2.0, dims.height + padding * 2.0, Color::new(0.0, 0.0, 0.0, 0.6));
    draw_text(label, 5.0 + padding, 5.0 + padding + dims.offset_y, LABEL_FONT_SIZE, WHITE);
}

fn control_key_pressed() -> Option<ControlKey> {
    if is_key_pressed(KeyCode::Up) {
        Some(ControlKey::SpreadUp)
    } else if is_key_pressed(KeyCode::Down) {
        Some(ControlKey::SpreadDown)
    } else if is_key_pressed(KeyCode::Left) {
        Some(ControlKey::SensitivityDown)
    } else if is_key_pressed(KeyCode::Right) {
        Some(ControlKey::SensitivityUp)
    } else {
        None
    }
}

fn paint(image: &mut Image, width: usize, points: &[DensityPoint]) {
    let image_data = image.get_image_data_mut();
    image_data.fill([0, 0, 0, 255]);
    for point in points {
        let value = (point.intensity * 255.0) as u8;
        image_data[point.y as usize * width + point.x as usize] = [value, value, value, 255];
    }
}

async fn run(mut engine: Engine, fps: f64) {
    let width = engine.config().width;
    let height = engine.config().height;

    let mut image = Image::gen_image_color(width as u16, height as u16, BLACK);
    let texture = Texture2D::from_image(&image);
    texture.set_filter(FilterMode::Nearest);
    let mut points: Vec<DensityPoint> = Vec::with_capacity(width * height / 4);

    let frame_interval = 1.0 / fps;
    let mut last_render = f64::NEG_INFINITY;
    let mut last_mouse = mouse_position();
    let mut show_help = false;

    let mut last_metrics_time = get_time();
    let mut frames = 0u32;
    let mut skipped = 0u32;
    let mut render_time = 0.0;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        if is_key_pressed(KeyCode::Slash) {
            show_help = !show_help;
            debug!(show_help, "help display toggled");
        }

        // Window coordinates to grid coordinates, in case the window was resized
        let mouse = mouse_position();
        if mouse != last_mouse {
            last_mouse = mouse;
            let x = mouse.0 * width as f32 / screen_width();
            let y = mouse.1 * height as f32 / screen_height();
            engine.on_pointer_move(x, y);
        }
        if let Some(key) = control_key_pressed() {
            engine.on_key(key);
        }

        let now = get_time();
        if now - last_render >= frame_interval {
            if engine.render_frame(&mut points) {
                paint(&mut image, width, &points);
                texture.update(&image);
                last_render = now;
                frames += 1;
                render_time += get_time() - now;
            } else {
                skipped += 1;
            }
        }

        clear_background(BLACK);
        draw_texture_ex(
            &texture,
            0.0,
            0.0,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(screen_width(), screen_height())),
                ..Default::default()
            },
        );
        draw_parameters_label(&engine.current_parameters_label());
        if show_help {
            draw_command_summary();
        }

        if now - last_metrics_time >= METRICS_INTERVAL {
            let elapsed = now - last_metrics_time;
            debug!(
                fps = frames as f64 / elapsed,
                skipped,
                render_ms = if frames > 0 { render_time * 1000.0 / frames as f64 } else { 0.0 },
                points = points.len(),
                generations = engine.completed_generations(),
                "render metrics"
            );
            last_metrics_time = now;
            frames = 0;
            skipped = 0;
            render_time = 0.0;
        }

        next_frame().await
    }

    engine.shutdown();
    info!("Exiting");
    std::process::exit(0);
}
