// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 视频输入系统
//!
//! 采集的生命周期用"代数"管理: 启动采集领取新代数, 停止采集使代数
//! 再次前进; 仍在跑的旧代解码回调发现代数过期后自行退出。
//! 已在途的解码帧不被强行取消, 只是无人再消费。

#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "camera")]
pub mod decode_filter;

use std::sync::atomic::{AtomicUsize, Ordering};

/// 当前活动采集代数
static ACTIVE_CAPTURE_GENERATION: AtomicUsize = AtomicUsize::new(0);

/// 领取新代数并使旧采集过期 (启动采集时调用)
pub fn begin_capture_generation() -> usize {
    ACTIVE_CAPTURE_GENERATION.fetch_add(1, Ordering::SeqCst) + 1
}

/// 使当前采集过期 (停止采集时调用, 可重复调用)
pub fn expire_capture() {
    ACTIVE_CAPTURE_GENERATION.fetch_add(1, Ordering::SeqCst);
}

/// 判断指定代数的采集是否仍然活动
pub fn is_generation_active(generation: usize) -> bool {
    ACTIVE_CAPTURE_GENERATION.load(Ordering::SeqCst) == generation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_lifecycle() {
        let gen = begin_capture_generation();
        assert!(is_generation_active(gen));

        expire_capture();
        assert!(!is_generation_active(gen));

        // 重复过期无副作用
        expire_capture();
        assert!(!is_generation_active(gen));

        let next = begin_capture_generation();
        assert!(is_generation_active(next));
        assert!(next > gen);
    }
}
