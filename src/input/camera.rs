// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 摄像头输入模块
//!
//! 支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};

use super::decode_filter::CaptureFilter;
use crate::pipeline::{CapturedFrame, FrameWell};

/// 摄像头采集器
pub struct CameraCapture {
    device_index: usize,
    device_name: String,
    generation: usize,
}

impl CameraCapture {
    pub fn new(device_index: usize, device_name: String, generation: usize) -> Self {
        Self {
            device_index,
            device_name,
            generation,
        }
    }

    /// 打开摄像头并阻塞运行解码循环, 直到采集代数过期或流结束
    ///
    /// 打开失败返回错误 (权限/设备占用), 由调用方恢复启动控件。
    pub fn run(&self, well: FrameWell, tx_display: Sender<CapturedFrame>) -> Result<()> {
        println!("🎥 摄像头采集 (Gen: {})", self.generation);
        println!("📷 设备: [{}] {}", self.device_index, self.device_name);

        let camera_url = Self::format_camera_url(self.device_index, &self.device_name);
        let filter = CaptureFilter::new(well, tx_display, self.generation);

        let mut retry_count = 0;
        let max_retries = 3;

        loop {
            let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
            let pipe = pipe.filter("capture", Box::new(filter.clone()));
            let out = create_null_output().add_frame_pipeline(pipe);

            let input = Input::new(camera_url.as_str())
                .set_format(Self::input_format())
                .set_input_opts([("framerate", "30"), ("video_size", "1280x720")].into());

            let ctx = match FfmpegContext::builder().input(input).output(out).build() {
                Ok(ctx) => ctx,
                Err(e) => {
                    retry_count += 1;
                    eprintln!("❌ 摄像头打开失败: {}", e);
                    if retry_count >= max_retries {
                        return Err(anyhow!("摄像头打开失败 (重试{}次): {}", max_retries, e));
                    }
                    println!("⚠️ 摄像头忙或无法打开, 1秒后重试... ({}/{})", retry_count, max_retries);
                    std::thread::sleep(std::time::Duration::from_secs(1));
                    continue;
                }
            };

            let sch = ctx
                .start()
                .map_err(|e| anyhow!("摄像头启动失败: {}", e))?;

            println!("✅ 摄像头连接成功, 开始解码!");
            let _ = sch.wait();
            println!("📹 摄像头解码循环结束 (Gen: {})", self.generation);
            return Ok(());
        }
    }

    /// 摄像头URL - 按平台格式化
    fn format_camera_url(index: usize, name: &str) -> String {
        #[cfg(target_os = "windows")]
        {
            let _ = index;
            format!("video={}", name)
        }
        #[cfg(target_os = "macos")]
        {
            let _ = name;
            format!("{}", index)
        }
        #[cfg(target_os = "linux")]
        {
            let _ = name;
            format!("/dev/video{}", index)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            let _ = name;
            format!("{}", index)
        }
    }

    fn input_format() -> &'static str {
        #[cfg(target_os = "windows")]
        {
            "dshow"
        }
        #[cfg(target_os = "macos")]
        {
            "avfoundation"
        }
        #[cfg(target_os = "linux")]
        {
            "v4l2"
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            "video4linux2"
        }
    }
}

/// 获取可用的摄像头设备列表
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            eprintln!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}
