// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 叠加绘制: 以当前帧为背景, 画出检测框、得分标签与帧率角标

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::postprocess::{score_label, Detection};

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BADGE_BG: Rgba<u8> = Rgba([0, 0, 0, 255]);
const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度(粗略估计)
const LABEL_TEXT_HEIGHT: u32 = 24;
/// 帧率角标固定位置
const BADGE_POS: (i32, i32) = (10, 10);

pub struct OverlayPainter {
    font: Option<FontVec>,
}

impl OverlayPainter {
    /// 从磁盘加载标签字体; 加载失败只绘制边框, 不绘制文字
    pub fn new(font_path: Option<&str>) -> Self {
        let font = font_path.and_then(|path| match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    println!("✅ 标签字体加载成功: {}", path);
                    Some(font)
                }
                Err(e) => {
                    eprintln!("⚠️ 字体解析失败: {} ({}), 仅绘制边框", path, e);
                    None
                }
            },
            Err(e) => {
                eprintln!("⚠️ 字体读取失败: {} ({}), 仅绘制边框", path, e);
                None
            }
        });
        Self { font }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 清屏重绘: 背景即当前帧的新拷贝, 在其上叠加检测结果与帧率
    pub fn paint(&self, mut surface: RgbaImage, detections: &[Detection], fps: f64) -> RgbaImage {
        for det in detections {
            self.draw_detection(&mut surface, det);
        }
        self.draw_fps_badge(&mut surface, fps);
        surface
    }

    fn draw_detection(&self, surface: &mut RgbaImage, det: &Detection) {
        let w = surface.width() as f32;
        let h = surface.height() as f32;
        if w < 1.0 || h < 1.0 {
            return;
        }

        let x1 = det.x1.clamp(0.0, w - 1.0) as i32;
        let y1 = det.y1.clamp(0.0, h - 1.0) as i32;
        let x2 = det.x2.clamp(0.0, w - 1.0) as i32;
        let y2 = det.y2.clamp(0.0, h - 1.0) as i32;
        if x2 <= x1 || y2 <= y1 {
            return;
        }

        // 边框加粗: 逐像素内缩重画, 矩形边界含x2/y2
        for t in 0..BOX_THICKNESS {
            let bw = (x2 - x1 + 1) - 2 * t;
            let bh = (y2 - y1 + 1) - 2 * t;
            if bw <= 0 || bh <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(bw as u32, bh as u32);
            draw_hollow_rect_mut(surface, rect, BOX_COLOR);
        }

        if let Some(font) = &self.font {
            let label = score_label(det.score);
            let text_width = (label.len() as f32 * LABEL_CHAR_WIDTH) as i32;
            let label_x = x1.max(0);
            let label_y = (y1 - LABEL_TEXT_HEIGHT as i32).max(0);
            let label_w = text_width.min(surface.width() as i32 - label_x);
            if label_w > 0 {
                let bg = Rect::at(label_x, label_y).of_size(label_w as u32, LABEL_TEXT_HEIGHT);
                draw_filled_rect_mut(surface, bg, BOX_COLOR);
                draw_text_mut(
                    surface,
                    BADGE_BG,
                    label_x,
                    label_y + 2,
                    PxScale::from(LABEL_FONT_SIZE),
                    font,
                    &label,
                );
            }
        }
    }

    /// 帧率角标: 固定位置的不透明标签
    fn draw_fps_badge(&self, surface: &mut RgbaImage, fps: f64) {
        let Some(font) = &self.font else {
            return;
        };
        let text = format!("FPS: {:.1}", fps);
        let width = (text.len() as f32 * LABEL_CHAR_WIDTH) as u32;
        let bg = Rect::at(BADGE_POS.0, BADGE_POS.1).of_size(width.max(1), LABEL_TEXT_HEIGHT);
        draw_filled_rect_mut(surface, bg, BADGE_BG);
        draw_text_mut(
            surface,
            TEXT_COLOR,
            BADGE_POS.0,
            BADGE_POS.1 + 2,
            PxScale::from(LABEL_FONT_SIZE),
            font,
            &text,
        );
    }
}
