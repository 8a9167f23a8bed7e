// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 实时检测流水线
//!
//! 双活动架构:
//! - 采集线程: 摄像头帧 → 最新帧槽位 + 显示通道 (显示刷新率)
//! - 采样线程: 固定周期快照 → 预处理 → 推理 → 后处理 → 叠加帧 (每100ms)

pub mod sampler;

use std::sync::{Arc, Mutex};

/// 采集帧 (采集线程 → 采样线程/渲染线程)
#[derive(Clone)]
pub struct CapturedFrame {
    pub rgba: Arc<Vec<u8>>, // Arc共享像素数据, 避免复制
    pub width: u32,
    pub height: u32,
    pub frame_id: u64,
    pub capture_fps: f64,
}

/// 叠加帧 (采样线程 → 渲染线程): 背景+检测框+帧率角标已画好
#[derive(Clone)]
pub struct OverlayFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub detections: usize,
    pub detect_fps: f64,
    pub inference_ms: f64,
}

/// 最新帧槽位
///
/// 采集端持续覆盖, 采样端每个周期取一次快照; 只保留最新一帧,
/// 不保留历史。
#[derive(Clone, Default)]
pub struct FrameWell {
    slot: Arc<Mutex<Option<CapturedFrame>>>,
}

impl FrameWell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: CapturedFrame) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame);
        }
    }

    pub fn snapshot(&self) -> Option<CapturedFrame> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_well_keeps_latest_only() {
        let well = FrameWell::new();
        assert!(well.snapshot().is_none());

        for id in 0..3 {
            well.publish(CapturedFrame {
                rgba: Arc::new(vec![0u8; 4]),
                width: 1,
                height: 1,
                frame_id: id,
                capture_fps: 0.0,
            });
        }
        assert_eq!(well.snapshot().unwrap().frame_id, 2);
    }

    #[test]
    fn test_frame_well_clear() {
        let well = FrameWell::new();
        well.publish(CapturedFrame {
            rgba: Arc::new(vec![0u8; 4]),
            width: 1,
            height: 1,
            frame_id: 0,
            capture_fps: 0.0,
        });
        well.clear();
        assert!(well.snapshot().is_none());
    }
}
