/// 锐眼 (SharpEye)
///
/// 实时目标检测叠加系统
///
/// 系统架构:
/// 1. 采集线程: 摄像头解码 → 最新帧槽位 + 显示通道 (独立工作线程)
/// 2. 采样线程: 每100ms一次 快照→预处理→推理→后处理→叠加帧 (独立工作线程)
/// 3. 主线程:   渲染显示 (macroquad事件循环, 每个显示刷新绘制最新画面)
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use egui_macroquad::egui;
use macroquad::prelude::*;

use sharpeye_rs::input::camera::{get_camera_devices, CameraCapture};
use sharpeye_rs::pipeline::sampler::{Sampler, StopHandle};
use sharpeye_rs::{
    gen_time_string, input, CapturedFrame, DetectorConfig, FrameWell, OrtBackend, OverlayFrame,
    OverlayPainter, Postprocessor,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 锐眼参数
#[derive(Parser, Debug)]
#[command(author, version, about = "锐眼 - 实时目标检测叠加", long_about = None)]
struct Args {
    /// 模型文件路径 (覆盖配置文件)
    #[arg(short, long)]
    model: Option<String>,

    /// 配置文件路径
    #[arg(short, long, default_value = "sharpeye.json")]
    config: String,

    /// 摄像头设备序号
    #[arg(short, long, default_value_t = 0)]
    device: usize,

    /// 列出可用摄像头设备后退出
    #[arg(long, default_value_t = false)]
    list_devices: bool,
}

fn window_conf() -> Conf {
    Conf {
        window_title: String::from("锐眼 - SharpEye"),
        window_width: 1280,
        window_height: 720,
        window_resizable: true,
        ..Default::default()
    }
}

/// 纹理上传: 分辨率不变时原地更新, 避免重新分配GPU内存
fn upload_texture(slot: &mut Option<Texture2D>, rgba: &[u8], width: u32, height: u32) {
    let needs_rebuild = match slot {
        Some(tex) => tex.width() != width as f32 || tex.height() != height as f32,
        None => true,
    };
    if needs_rebuild {
        let texture = Texture2D::from_rgba8(width as u16, height as u16, rgba);
        texture.set_filter(FilterMode::Linear);
        *slot = Some(texture);
    } else if let Some(tex) = slot {
        tex.update(&Image {
            bytes: rgba.to_vec(),
            width: width as u16,
            height: height as u16,
        });
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let args = Args::parse();

    if args.list_devices {
        let devices = get_camera_devices();
        if devices.is_empty() {
            println!("⚠️ 未发现摄像头设备");
        }
        for (index, name) in devices {
            println!("📷 [{}] {}", index, name);
        }
        return;
    }

    let mut config = DetectorConfig::load(&args.config);
    if let Some(model) = args.model {
        config.model = model;
    }
    config.print_summary();

    // 模型会话: 进程启动时创建一次, 之后只读共享。
    // 加载失败不致命: 会话缺失时采样周期全部静默空转, 画面照常显示。
    let engine = match OrtBackend::build(config.ort_config()) {
        Ok(engine) => {
            engine.summary();
            Some(Arc::new(engine))
        }
        Err(e) => {
            eprintln!("❌ 模型加载失败, 检测功能停用: {:#}", e);
            None
        }
    };

    let well = FrameWell::new();
    let (tx_raw, rx_raw) = crossbeam_channel::bounded::<CapturedFrame>(2);
    let (tx_overlay, rx_overlay) = crossbeam_channel::bounded::<OverlayFrame>(1);

    // UI状态
    let running = Arc::new(AtomicBool::new(false));
    let mut stop_handle: Option<StopHandle> = None;
    let mut conf_threshold = config.conf_threshold;

    // 渲染状态
    let mut raw_texture: Option<Texture2D> = None;
    let mut overlay_texture: Option<Texture2D> = None;
    let mut last_raw: Option<CapturedFrame> = None;
    let mut last_overlay: Option<OverlayFrame> = None;
    let mut render_count: u64 = 0;
    let mut render_last = Instant::now();
    let mut render_fps = 0.0;

    println!("✅ 系统就绪\n");

    loop {
        // 只保留最新一帧, 丢弃积压
        if let Some(frame) = rx_raw.try_iter().last() {
            upload_texture(&mut raw_texture, &frame.rgba, frame.width, frame.height);
            last_raw = Some(frame);
        }
        if let Some(frame) = rx_overlay.try_iter().last() {
            upload_texture(&mut overlay_texture, &frame.rgba, frame.width, frame.height);
            last_overlay = Some(frame);
        }

        clear_background(BLACK);

        // 检测开始后采样线程是检测画面的唯一周期性写入者,
        // 渲染循环只负责把最新叠加帧拉伸到窗口; 停止后画面冻结,
        // 上一次的检测框保持可见。
        let active = overlay_texture.as_ref().or(raw_texture.as_ref());
        if let Some(texture) = active {
            draw_texture_ex(
                texture,
                0.0,
                0.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(screen_width(), screen_height())),
                    ..Default::default()
                },
            );
        }

        // 渲染帧率
        render_count += 1;
        if render_last.elapsed().as_secs_f64() >= 1.0 {
            render_fps = render_count as f64 / render_last.elapsed().as_secs_f64();
            render_count = 0;
            render_last = Instant::now();
        }

        let is_running = running.load(Ordering::SeqCst);

        egui_macroquad::ui(|egui_ctx| {
            egui::Window::new("控制面板")
                .default_pos(egui::pos2(10.0, 10.0))
                .show(egui_ctx, |ui| {
                    ui.label(format!(
                        "模型: {}",
                        if engine.is_some() { "已加载" } else { "未加载" }
                    ));
                    if let Some(frame) = &last_raw {
                        ui.label(format!(
                            "采集: {}x{} @ {:.1}fps",
                            frame.width, frame.height, frame.capture_fps
                        ));
                    }
                    if let Some(overlay) = &last_overlay {
                        ui.label(format!(
                            "检测: {} 个目标 | {:.1}fps | {:.1}ms",
                            overlay.detections, overlay.detect_fps, overlay.inference_ms
                        ));
                    }
                    ui.label(format!("渲染: {:.1}fps", render_fps));
                    ui.separator();

                    ui.add(
                        egui::Slider::new(&mut conf_threshold, 0.0..=1.0).text("置信度阈值"),
                    );
                    ui.small("阈值在下次启动时生效");
                    ui.separator();

                    ui.horizontal(|ui| {
                        if ui
                            .add_enabled(!is_running, egui::Button::new("▶ 启动"))
                            .clicked()
                        {
                            let generation = input::begin_capture_generation();
                            let device_name = get_camera_devices()
                                .into_iter()
                                .find(|(index, _)| *index == args.device)
                                .map(|(_, name)| name)
                                .unwrap_or_default();

                            let mut live_config = config.clone();
                            live_config.conf_threshold = conf_threshold;
                            let sampler = Sampler::new(
                                engine.clone(),
                                Postprocessor::new(live_config.postprocess_config()),
                                OverlayPainter::new(Some(live_config.font_path.as_str())),
                                well.clone(),
                                tx_overlay.clone(),
                                live_config.sampler_config(),
                            );
                            let handle = sampler.stop_handle();
                            std::thread::spawn(move || sampler.run());

                            let capture = CameraCapture::new(args.device, device_name, generation);
                            let capture_well = well.clone();
                            let capture_tx = tx_raw.clone();
                            let capture_running = running.clone();
                            let capture_stop = handle.clone();
                            std::thread::spawn(move || {
                                if let Err(e) = capture.run(capture_well, capture_tx) {
                                    // 采集失败: 记录日志并恢复启动控件, 不重试
                                    eprintln!("❌ 摄像头采集失败: {:#}", e);
                                }
                                capture_stop.stop();
                                capture_running.store(false, Ordering::SeqCst);
                            });

                            stop_handle = Some(handle);
                            running.store(true, Ordering::SeqCst);
                        }

                        if ui
                            .add_enabled(is_running, egui::Button::new("⏹ 停止"))
                            .clicked()
                        {
                            // 停止: 采集代数过期 + 采样器停机; 在途周期完成后结果被丢弃
                            if let Some(handle) = stop_handle.take() {
                                handle.stop();
                            }
                            input::expire_capture();
                            well.clear();
                            running.store(false, Ordering::SeqCst);
                        }
                    });
                });
        });
        egui_macroquad::draw();

        // S键: 保存当前画面快照
        if is_key_pressed(KeyCode::S) {
            let saved = if let Some(overlay) = &last_overlay {
                Some((overlay.rgba.clone(), overlay.width, overlay.height))
            } else {
                last_raw
                    .as_ref()
                    .map(|f| (f.rgba.to_vec(), f.width, f.height))
            };
            if let Some((rgba, width, height)) = saved {
                let path = format!("snapshot_{}.png", gen_time_string("-"));
                match image::save_buffer(&path, &rgba, width, height, image::ExtendedColorType::Rgba8)
                {
                    Ok(_) => println!("💾 快照已保存: {}", path),
                    Err(e) => eprintln!("❌ 快照保存失败: {}", e),
                }
            }
        }

        next_frame().await
    }
}
