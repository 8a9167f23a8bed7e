// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 帧采样器: 固定周期触发完整推理流程
//
// 采样线程由crossbeam的tick通道驱动, 通道深度为1:
// 单次推理慢于采样周期时, 落后的采样点被跳过, 永远不会排队或并发,
// 任意时刻至多一次推理在途, 不会出现多次推理争抢同一画面。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use super::{FrameWell, OverlayFrame};
use crate::fps::FpsTracker;
use crate::ort_backend::{find_output, OrtBackend};
use crate::overlay::OverlayPainter;
use crate::postprocess::Postprocessor;
use crate::preprocess;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// 采样周期
    pub interval: Duration,
    /// 框坐标输出的声明名
    pub output_boxes: String,
    /// 得分输出的声明名
    pub output_scores: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            output_boxes: String::from("boxes"),
            output_scores: String::from("scores"),
        }
    }
}

/// 采样停止句柄, 可跨线程克隆; 重复调用stop无副作用
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            println!("🛑 采样器停止请求已发出");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct Sampler {
    engine: Option<Arc<OrtBackend>>,
    postprocessor: Postprocessor,
    painter: OverlayPainter,
    well: FrameWell,
    tx_overlay: Sender<OverlayFrame>,
    config: SamplerConfig,
    stop: Arc<AtomicBool>,
    fps: FpsTracker,
    frame_count: u64,
    lagged: u64,
}

impl Sampler {
    /// engine为None时采样器照常运转, 每个周期都是静默空转
    /// (模型加载失败不致命, 见错误设计)
    pub fn new(
        engine: Option<Arc<OrtBackend>>,
        postprocessor: Postprocessor,
        painter: OverlayPainter,
        well: FrameWell,
        tx_overlay: Sender<OverlayFrame>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            engine,
            postprocessor,
            painter,
            well,
            tx_overlay,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            fps: FpsTracker::new(),
            frame_count: 0,
            lagged: 0,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: self.stop.clone(),
        }
    }

    /// 采样主循环, 在独立线程上运行直到停止
    pub fn run(mut self) {
        println!(
            "✅ 采样线程启动, 周期 {}ms",
            self.config.interval.as_millis()
        );
        let ticker = crossbeam_channel::tick(self.config.interval);
        for _ in ticker.iter() {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            let started = Instant::now();
            self.tick();
            if started.elapsed() > self.config.interval {
                self.lagged += 1;
                if self.lagged % 10 == 1 {
                    println!(
                        "⏱️ 推理耗时超过采样周期, 已跳过落后采样点 {} 次",
                        self.lagged
                    );
                }
            }
        }
        println!(
            "✅ 采样线程退出 (共 {} 帧, 跳过 {} 次)",
            self.frame_count, self.lagged
        );
    }

    /// 单个采样周期: 快照 → 预处理 → 推理 → 后处理 → 发布
    ///
    /// 任一前置条件缺失则本周期静默空转; 任一阶段失败只放弃本周期,
    /// 不重试、不影响下一个周期。
    fn tick(&mut self) {
        let Some(engine) = self.engine.clone() else {
            return; // 模型未加载
        };
        let Some(frame) = self.well.snapshot() else {
            return; // 无活动视频流
        };

        let started = Instant::now();

        // 1. 当前帧绘制进固定尺寸离屏画面
        let surface = match preprocess::to_surface(&frame.rgba, frame.width, frame.height) {
            Ok(surface) => surface,
            Err(e) => {
                eprintln!("❌ 离屏绘制失败: {:#}", e);
                return;
            }
        };

        // 2. 构造归一化张量
        let tensor = match preprocess::to_input_tensor(&surface) {
            Ok(tensor) => tensor,
            Err(e) => {
                eprintln!("❌ 张量构造失败: {:#}", e);
                return;
            }
        };

        // 3. 推理
        let outputs = match engine.run(&tensor) {
            Ok(outputs) => outputs,
            Err(e) => {
                eprintln!("❌ 推理失败, 本周期放弃: {:#}", e);
                return;
            }
        };

        // 4. 按声明名取出两个输出, 缺失或为空视为畸形结果
        let Some(boxes) = find_output(&outputs, &self.config.output_boxes) else {
            eprintln!(
                "❌ 推理输出缺少 {:?}, 模型声明的输出: {:?}",
                self.config.output_boxes,
                engine.output_names()
            );
            return;
        };
        let Some(scores) = find_output(&outputs, &self.config.output_scores) else {
            eprintln!(
                "❌ 推理输出缺少 {:?}, 模型声明的输出: {:?}",
                self.config.output_scores,
                engine.output_names()
            );
            return;
        };
        if boxes.is_empty() || scores.is_empty() {
            eprintln!(
                "❌ 推理输出为空: {}={}, {}={}",
                self.config.output_boxes,
                boxes.len(),
                self.config.output_scores,
                scores.len()
            );
            return;
        }

        // 5. 后处理 + 叠加绘制
        let detections = self.postprocessor.decode(
            boxes,
            scores,
            preprocess::INPUT_WIDTH as f32,
            preprocess::INPUT_HEIGHT as f32,
        );
        let detect_fps = self.fps.tick();
        let inference_ms = started.elapsed().as_secs_f64() * 1000.0;
        let painted = self.painter.paint(surface, &detections, detect_fps);

        // 停止后完成的在途周期: 结果直接丢弃
        if self.stop.load(Ordering::SeqCst) {
            return;
        }

        self.frame_count += 1;
        let overlay = OverlayFrame {
            width: painted.width(),
            height: painted.height(),
            rgba: painted.into_raw(),
            detections: detections.len(),
            detect_fps,
            inference_ms,
        };
        // 渲染端未取走旧帧时丢弃本帧, 不阻塞采样
        let _ = self.tx_overlay.try_send(overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::PostprocessConfig;

    fn test_sampler(
        interval_ms: u64,
    ) -> (Sampler, crossbeam_channel::Receiver<OverlayFrame>, FrameWell) {
        let well = FrameWell::new();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sampler = Sampler::new(
            None,
            Postprocessor::new(PostprocessConfig::default()),
            OverlayPainter::without_font(),
            well.clone(),
            tx,
            SamplerConfig {
                interval: Duration::from_millis(interval_ms),
                ..Default::default()
            },
        );
        (sampler, rx, well)
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (sampler, _rx, _well) = test_sampler(5);
        let handle = sampler.stop_handle();
        let joiner = std::thread::spawn(move || sampler.run());

        std::thread::sleep(Duration::from_millis(20));
        handle.stop();
        handle.stop(); // 第二次停止: 无活动流, 不报错
        assert!(handle.is_stopped());
        joiner.join().unwrap();
    }

    #[test]
    fn test_no_engine_means_silent_noop_ticks() {
        let (sampler, rx, well) = test_sampler(5);
        well.publish(super::super::CapturedFrame {
            rgba: Arc::new(vec![0u8; 4 * 4 * 4]),
            width: 4,
            height: 4,
            frame_id: 0,
            capture_fps: 0.0,
        });
        let handle = sampler.stop_handle();
        let joiner = std::thread::spawn(move || sampler.run());

        std::thread::sleep(Duration::from_millis(40));
        handle.stop();
        joiner.join().unwrap();
        // 模型未加载: 所有周期空转, 不产生叠加帧
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_ticks_after_stop() {
        let (sampler, rx, _well) = test_sampler(5);
        let handle = sampler.stop_handle();
        handle.stop(); // 启动前已停止
        sampler.run(); // 应立即退出
        assert!(rx.try_recv().is_err());
    }
}
