// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::ort_backend::{OrtConfig, OrtEP};
use crate::pipeline::sampler::SamplerConfig;
use crate::postprocess::{PostprocessConfig, Suppression};

/// 检测器参数配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorConfig {
    // === 模型 ===
    pub model: String,                 // 模型文件路径
    pub ort_dylib: Option<String>,     // 推理引擎运行库目录 (可选)
    pub cuda: bool,                    // CUDA执行后端
    pub trt: bool,                     // TensorRT执行后端
    pub device_id: i32,                // GPU设备序号

    // === 采样 ===
    pub sample_interval_ms: u64,       // 采样周期, 与显示刷新解耦

    // === 后处理 ===
    pub conf_threshold: f32,           // 归一化得分阈值
    pub max_detections: usize,         // 单帧绘制上限
    pub output_boxes: String,          // 框坐标输出名
    pub output_scores: String,         // 得分输出名
    pub suppression: String,           // 重叠抑制: "off" | "nms"
    pub nms_iou: f32,                  // NMS的IoU阈值 (suppression="nms"时生效)

    // === 叠加绘制 ===
    pub font_path: String,             // 标签字体路径
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: String::from("models/det.onnx"),
            ort_dylib: None,
            cuda: false,
            trt: false,
            device_id: 0,
            sample_interval_ms: 100,
            conf_threshold: 0.9,
            max_detections: 100,
            output_boxes: String::from("boxes"),
            output_scores: String::from("scores"),
            suppression: String::from("off"),
            nms_iou: 0.45,
            font_path: String::from("assets/font.ttf"),
        }
    }
}

impl DetectorConfig {
    /// 从JSON文件加载配置, 不存在时创建默认配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    println!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    eprintln!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                println!("📝 配置文件不存在, 创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    eprintln!("❌ 保存配置失败: {}", e);
                } else {
                    println!("💾 配置已保存到 {}", path);
                }
            }
            Err(e) => eprintln!("❌ 序列化配置失败: {}", e),
        }
    }

    pub fn ep(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }

    pub fn ort_config(&self) -> OrtConfig {
        OrtConfig {
            model: self.model.clone(),
            ep: self.ep(),
            dylib_dir: self.ort_dylib.clone(),
        }
    }

    pub fn suppression_mode(&self) -> Suppression {
        match self.suppression.as_str() {
            "nms" => Suppression::Nms { iou: self.nms_iou },
            "off" => Suppression::Off,
            other => {
                eprintln!("⚠️ 未知抑制策略 {:?}, 按off处理", other);
                Suppression::Off
            }
        }
    }

    pub fn postprocess_config(&self) -> PostprocessConfig {
        PostprocessConfig {
            conf_threshold: self.conf_threshold,
            max_detections: self.max_detections,
            suppression: self.suppression_mode(),
        }
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.sample_interval_ms),
            output_boxes: self.output_boxes.clone(),
            output_scores: self.output_scores.clone(),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        println!("\n🎛️ 当前检测器配置:");
        println!("  模型: {}", self.model);
        println!("  采样周期: {}ms", self.sample_interval_ms);
        println!("  置信度阈值: {:.2}", self.conf_threshold);
        println!("  单帧上限: {}", self.max_detections);
        println!(
            "  输出名: boxes={:?} scores={:?}",
            self.output_boxes, self.output_scores
        );
        println!("  重叠抑制: {}\n", self.suppression);
    }
}
