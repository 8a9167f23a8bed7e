// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 后处理: 原始输出张量 → 检测框
// 包含: 帧内最大值归一化、阈值过滤、坐标裁剪、数量上限、可插拔抑制

/// 检测框 (画面像素坐标系)
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// 帧内归一化得分, [0,1], 本帧最高分恒为1.0
    pub score: f32,
}

impl Detection {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let l = self.x1.max(other.x1);
        let r = self.x2.min(other.x2);
        let t = self.y1.max(other.y1);
        let b = self.y2.min(other.y2);
        let inter = (r - l).max(0.0) * (b - t).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }
}

/// 重叠框抑制策略
///
/// 默认不做任何抑制, 同一目标的重叠框原样全部画出;
/// NMS作为可配置步骤暴露, 需要时显式开启。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suppression {
    Off,
    Nms { iou: f32 },
}

#[derive(Debug, Clone)]
pub struct PostprocessConfig {
    /// 归一化得分阈值, 低于该值的检测不绘制
    pub conf_threshold: f32,
    /// 单帧绘制上限
    pub max_detections: usize,
    pub suppression: Suppression,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.9,
            max_detections: 100,
            suppression: Suppression::Off,
        }
    }
}

/// 帧内最大值归一化
///
/// 每个得分除以本帧最大得分, 最高分检测恒为1.0; 这是逐帧相对
/// 策略而非概率校准。最大值不为正时全部归零, 避免除零。
pub fn normalize_scores(raw: &[f32]) -> Vec<f32> {
    let max_score = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max_score.is_finite() || max_score <= 0.0 {
        return vec![0.0; raw.len()];
    }
    raw.iter().map(|s| s / max_score).collect()
}

/// 得分标签文本, 保留两位小数
pub fn score_label(score: f32) -> String {
    format!("Score: {:.2}", score)
}

pub struct Postprocessor {
    config: PostprocessConfig,
}

impl Postprocessor {
    pub fn new(config: PostprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PostprocessConfig {
        &self.config
    }

    /// 原始输出 → 检测框列表
    ///
    /// boxes按检测序号i取连续窗口[4i, 4i+4)作为[x1,y1,x2,y2],
    /// 与scores的下标i对齐。遍历保持得分缓冲区原始顺序, 不排序;
    /// 每个坐标独立裁剪进[0,宽]/[0,高]; 达到上限后立即停止。
    pub fn decode(
        &self,
        boxes: &[f32],
        scores: &[f32],
        surface_w: f32,
        surface_h: f32,
    ) -> Vec<Detection> {
        let normalized = normalize_scores(scores);

        let mut accepted = Vec::new();
        for (i, &score) in normalized.iter().enumerate() {
            if matches!(self.config.suppression, Suppression::Off)
                && accepted.len() >= self.config.max_detections
            {
                break;
            }
            if score < self.config.conf_threshold {
                continue;
            }
            let Some(win) = boxes.get(4 * i..4 * i + 4) else {
                // 框缓冲区比得分短: 后续检测无坐标可取
                break;
            };
            accepted.push(Detection {
                x1: win[0].clamp(0.0, surface_w),
                y1: win[1].clamp(0.0, surface_h),
                x2: win[2].clamp(0.0, surface_w),
                y2: win[3].clamp(0.0, surface_h),
                score,
            });
        }

        if let Suppression::Nms { iou } = self.config.suppression {
            non_max_suppression(&mut accepted, iou);
            accepted.truncate(self.config.max_detections);
        }
        accepted
    }
}

/// 贪心IoU抑制 (可选步骤, 默认不启用)
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].iou(&xs[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_pp() -> Postprocessor {
        Postprocessor::new(PostprocessConfig::default())
    }

    #[test]
    fn test_normalize_max_is_one() {
        let normalized = normalize_scores(&[0.5, 2.0, 1.0]);
        let max = normalized.iter().copied().fold(f32::MIN, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_max_guard() {
        assert_eq!(normalize_scores(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(normalize_scores(&[-1.0, -0.5]), vec![0.0, 0.0]);
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_threshold_boundary() {
        let pp = default_pp();
        // 归一化后: [0.89, 0.9, 1.0] — 严格低于0.9的被排除, 等于0.9的保留
        let scores = [0.89, 0.9, 1.0];
        let boxes = [0.0; 12];
        let dets = pp.decode(&boxes, &scores, 640.0, 640.0);
        assert_eq!(dets.len(), 2);
        assert!((dets[0].score - 0.9).abs() < 1e-6);
        assert!((dets[1].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_clamping_into_surface() {
        let pp = default_pp();
        let scores = [1.0];
        let boxes = [-50.0, -10.0, 9000.0, 700.0];
        let dets = pp.decode(&boxes, &scores, 640.0, 480.0);
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_eq!(d.x1, 0.0);
        assert_eq!(d.y1, 0.0);
        assert_eq!(d.x2, 640.0);
        assert_eq!(d.y2, 480.0);
    }

    #[test]
    fn test_detection_cap() {
        let pp = default_pp();
        let n = 150;
        let scores = vec![1.0f32; n];
        let boxes = vec![1.0f32; n * 4];
        let dets = pp.decode(&boxes, &scores, 640.0, 640.0);
        assert_eq!(dets.len(), 100);
    }

    #[test]
    fn test_order_preserved_without_sorting() {
        let pp = default_pp();
        let scores = [0.95, 1.0, 0.92];
        let boxes = [
            1.0, 1.0, 2.0, 2.0, //
            3.0, 3.0, 4.0, 4.0, //
            5.0, 5.0, 6.0, 6.0,
        ];
        let dets = pp.decode(&boxes, &scores, 640.0, 640.0);
        assert_eq!(dets.len(), 3);
        assert_eq!(dets[0].x1, 1.0);
        assert_eq!(dets[1].x1, 3.0);
        assert_eq!(dets[2].x1, 5.0);
    }

    #[test]
    fn test_short_box_buffer_stops_cleanly() {
        let pp = default_pp();
        let scores = [1.0, 1.0, 1.0];
        let boxes = [0.0, 0.0, 10.0, 10.0]; // 只够一个检测
        let dets = pp.decode(&boxes, &scores, 640.0, 640.0);
        assert_eq!(dets.len(), 1);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let pp = default_pp();
        let scores = [0.2, 0.95, 0.99, 0.4];
        let boxes = [
            0.0, 0.0, 10.0, 10.0, //
            5.0, 5.0, 50.0, 50.0, //
            100.0, 100.0, 300.0, 300.0, //
            0.0, 0.0, 0.0, 0.0,
        ];
        let normalized = normalize_scores(&scores);
        assert!((normalized[0] - 0.2020).abs() < 1e-3);
        assert!((normalized[1] - 0.9596).abs() < 1e-3);
        assert!((normalized[2] - 1.0).abs() < 1e-6);
        assert!((normalized[3] - 0.4040).abs() < 1e-3);

        let dets = pp.decode(&boxes, &scores, 640.0, 640.0);
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].x1, 5.0);
        assert_eq!(dets[1].x2, 300.0);
        assert_eq!(score_label(dets[1].score), "Score: 1.00");
    }

    #[test]
    fn test_nms_merges_overlaps() {
        let pp = Postprocessor::new(PostprocessConfig {
            suppression: Suppression::Nms { iou: 0.45 },
            conf_threshold: 0.5,
            ..Default::default()
        });
        let scores = [0.9, 1.0, 0.95];
        // 前两个框几乎重合, 第三个远离
        let boxes = [
            10.0, 10.0, 100.0, 100.0, //
            12.0, 12.0, 102.0, 102.0, //
            400.0, 400.0, 500.0, 500.0,
        ];
        let dets = pp.decode(&boxes, &scores, 640.0, 640.0);
        assert_eq!(dets.len(), 2);
        // 重合处保留得分更高者
        assert!((dets[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_score_label_format() {
        assert_eq!(score_label(1.0), "Score: 1.00");
        assert_eq!(score_label(0.955), "Score: 0.95");
    }
}
