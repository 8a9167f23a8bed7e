// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 检测器配置参数
pub mod fps; // 帧率统计
pub mod input; // 视频输入系统
pub mod overlay; // 叠加绘制
pub mod pipeline; // 实时检测流水线
pub mod postprocess; // 后处理与检测框
pub mod preprocess; // 张量预处理

pub mod ort_backend;

pub use crate::config::DetectorConfig;
pub use crate::ort_backend::{find_output, OrtBackend, OrtConfig, OrtEP, RawOutput};
pub use crate::overlay::OverlayPainter;
pub use crate::pipeline::sampler::{Sampler, SamplerConfig, StopHandle};
pub use crate::pipeline::{CapturedFrame, FrameWell, OverlayFrame};
pub use crate::postprocess::{Detection, PostprocessConfig, Postprocessor, Suppression};

pub fn gen_time_string(delimiter: &str) -> String {
    let offset = chrono::FixedOffset::east_opt(8 * 60 * 60).unwrap(); // Beijing
    let t_now = chrono::Utc::now().with_timezone(&offset);
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
