// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// FFmpeg解码过滤器: 摄像头帧 → RGBA → 最新帧槽位 + 显示通道

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};

use crate::pipeline::{CapturedFrame, FrameWell};

/// 采集过滤器: 每个解码帧转RGBA后发布
#[derive(Clone)]
pub struct CaptureFilter {
    well: FrameWell,
    tx_display: Sender<CapturedFrame>,
    generation: usize,
    frame_id: u64,
    count: u64,
    last: Instant,
    current_fps: f64,
}

impl CaptureFilter {
    pub fn new(well: FrameWell, tx_display: Sender<CapturedFrame>, generation: usize) -> Self {
        Self {
            well,
            tx_display,
            generation,
            frame_id: 0,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }
}

impl FrameFilter for CaptureFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        println!("✅ 采集解码启动 (Gen: {})", self.generation);
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        // 代数过期 = 采集已停止, 让解码循环结束
        if !crate::input::is_generation_active(self.generation) {
            println!("🛑 采集已停止 (Gen: {}), 解码退出", self.generation);
            return Err(String::from("capture expired"));
        }

        let (width, height, rgba) = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                return Ok(None);
            }
            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 || w > 4096 || h > 4096 {
                return Ok(None);
            }

            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;
            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                return Ok(None);
            }

            let y = std::slice::from_raw_parts(y_plane, y_stride * h as usize);
            let u = std::slice::from_raw_parts(u_plane, uv_stride * h.div_ceil(2) as usize);
            let v = std::slice::from_raw_parts(v_plane, uv_stride * h.div_ceil(2) as usize);
            (w, h, yuv420p_to_rgba(y, u, v, y_stride, uv_stride, w, h))
        };

        // 帧率统计: 每秒重算一次
        self.count += 1;
        self.frame_id += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.current_fps = self.count as f64 / elapsed;
            self.count = 0;
            self.last = Instant::now();
        }

        let captured = CapturedFrame {
            rgba: Arc::new(rgba),
            width,
            height,
            frame_id: self.frame_id,
            capture_fps: self.current_fps,
        };
        self.well.publish(captured.clone());
        // 渲染端落后时丢帧, 不阻塞解码
        let _ = self.tx_display.try_send(captured);

        Ok(None)
    }
}

/// YUV420P → RGBA (BT.601整数近似)
fn yuv420p_to_rgba(
    y: &[u8],
    u: &[u8],
    v: &[u8],
    y_stride: usize,
    uv_stride: usize,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut rgba = vec![0u8; (width * height * 4) as usize];
    for row in 0..height as usize {
        for col in 0..width as usize {
            let yv = y[row * y_stride + col] as i32;
            let uv_idx = (row / 2) * uv_stride + col / 2;
            let uv = u[uv_idx] as i32 - 128;
            let vv = v[uv_idx] as i32 - 128;

            let c = (yv - 16).max(0) * 298;
            let r = (c + 409 * vv + 128) >> 8;
            let g = (c - 100 * uv - 208 * vv + 128) >> 8;
            let b = (c + 516 * uv + 128) >> 8;

            let out = (row * width as usize + col) * 4;
            rgba[out] = r.clamp(0, 255) as u8;
            rgba[out + 1] = g.clamp(0, 255) as u8;
            rgba[out + 2] = b.clamp(0, 255) as u8;
            rgba[out + 3] = 255;
        }
    }
    rgba
}
