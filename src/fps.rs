// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::time::Instant;

/// 帧率下限保护: 间隔小于1ms按1ms计算, 避免除零产生Inf/NaN
const MIN_INTERVAL_MS: f64 = 1.0;

/// 检测帧率统计器
///
/// 每次postprocess调用tick()一次, 返回距上次调用的帧率(保留1位小数)。
/// 首次调用的基准点是统计器创建时刻(进程启动), 属于冷启动误差, 可接受。
pub struct FpsTracker {
    last: Instant,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// 计算距上一次tick的帧率, 并把当前时刻存为新基准
    pub fn tick(&mut self) -> f64 {
        let elapsed = self.last.elapsed();
        self.last = Instant::now();

        let ms = (elapsed.as_secs_f64() * 1000.0).max(MIN_INTERVAL_MS);
        let fps = 1000.0 / ms;
        (fps * 10.0).round() / 10.0
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}
