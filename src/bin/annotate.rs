/// 单张图片检测
///
/// 读取图片 → 固定尺寸离屏画面 → 推理 → 后处理 → 叠加绘制 → 保存PNG
/// 与实时流水线共用同一套预处理/推理/后处理代码, 无需摄像头即可验证全链路。
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use sharpeye_rs::{
    find_output, gen_time_string, preprocess, DetectorConfig, OrtBackend, OverlayPainter,
    Postprocessor,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 图片检测参数
#[derive(Parser, Debug)]
#[command(author, version, about = "单张图片检测与叠加标注", long_about = None)]
struct Args {
    /// 输入图片路径
    #[arg(short, long)]
    input: String,

    /// 输出图片路径 (默认按时间戳命名)
    #[arg(short, long)]
    output: Option<String>,

    /// 模型文件路径 (覆盖配置文件)
    #[arg(short, long)]
    model: Option<String>,

    /// 配置文件路径
    #[arg(short, long, default_value = "sharpeye.json")]
    config: String,

    /// 置信度阈值 (覆盖配置文件)
    #[arg(long)]
    conf: Option<f32>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DetectorConfig::load(&args.config);
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(conf) = args.conf {
        config.conf_threshold = conf;
    }
    config.print_summary();

    // 单次工具: 模型加载失败直接退出
    let engine = OrtBackend::build(config.ort_config())?;
    engine.summary();

    let img = image::open(&args.input)
        .with_context(|| format!("图片读取失败: {}", args.input))?
        .to_rgba8();
    println!("📷 输入图片: {} ({}x{})", args.input, img.width(), img.height());

    let surface = preprocess::to_surface(img.as_raw(), img.width(), img.height())?;
    let tensor = preprocess::to_input_tensor(&surface)?;

    let started = Instant::now();
    let outputs = engine.run(&tensor)?;
    let inference_ms = started.elapsed().as_secs_f64() * 1000.0;
    println!("⏱️ 推理耗时: {:.1}ms", inference_ms);

    let boxes = find_output(&outputs, &config.output_boxes).with_context(|| {
        format!(
            "推理输出缺少 {:?}, 模型声明的输出: {:?}",
            config.output_boxes,
            engine.output_names()
        )
    })?;
    let scores = find_output(&outputs, &config.output_scores).with_context(|| {
        format!(
            "推理输出缺少 {:?}, 模型声明的输出: {:?}",
            config.output_scores,
            engine.output_names()
        )
    })?;

    let postprocessor = Postprocessor::new(config.postprocess_config());
    let detections = postprocessor.decode(
        boxes,
        scores,
        preprocess::INPUT_WIDTH as f32,
        preprocess::INPUT_HEIGHT as f32,
    );

    println!("🎯 检测到 {} 个目标", detections.len());
    for (i, det) in detections.iter().enumerate() {
        println!(
            "   [{}] score={:.2} ({:.0},{:.0})-({:.0},{:.0})",
            i, det.score, det.x1, det.y1, det.x2, det.y2
        );
    }

    let painter = OverlayPainter::new(Some(config.font_path.as_str()));
    let annotated = painter.paint(surface, &detections, 1000.0 / inference_ms.max(1.0));

    let path = args
        .output
        .unwrap_or_else(|| format!("annotated_{}.png", gen_time_string("-")));
    annotated
        .save(&path)
        .with_context(|| format!("结果保存失败: {}", path))?;
    println!("💾 已保存: {}", path);

    Ok(())
}
