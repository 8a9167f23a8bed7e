// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 预处理: 原始RGBA帧 → 固定640x640离屏画面 → NCHW归一化张量

use anyhow::{bail, Context, Result};
use image::{imageops, RgbaImage};
use ndarray::{Array, IxDyn};

/// 推理输入尺寸 (模型固定640x640)
pub const INPUT_WIDTH: u32 = 640;
pub const INPUT_HEIGHT: u32 = 640;

/// 原始帧 → 固定尺寸离屏画面
///
/// 任何分辨率的输入都缩放到640x640, 之后的张量构造与叠加绘制
/// 都以这张画面为基准。
pub fn to_surface(rgba: &[u8], width: u32, height: u32) -> Result<RgbaImage> {
    let expected = (width as usize) * (height as usize) * 4;
    if rgba.len() != expected {
        bail!(
            "RGBA数据长度不匹配: 期望 {} ({}x{}x4), 实际 {}",
            expected,
            width,
            height,
            rgba.len()
        );
    }

    let img = RgbaImage::from_raw(width, height, rgba.to_vec())
        .context("无法从RGBA数据构造图像")?;

    if width == INPUT_WIDTH && height == INPUT_HEIGHT {
        return Ok(img);
    }
    Ok(imageops::resize(
        &img,
        INPUT_WIDTH,
        INPUT_HEIGHT,
        imageops::FilterType::Triangle,
    ))
}

/// 离屏画面 → [1,3,H,W] f32张量
///
/// 逐像素取R/G/B(丢弃Alpha), 除以255归一化到[0,1], 按通道优先
/// (先全部R, 再全部G, 再全部B)写入, 通道内保持行主序。
/// 除以255是唯一的归一化策略, 不做均值方差标准化。
pub fn to_input_tensor(surface: &RgbaImage) -> Result<Array<f32, IxDyn>> {
    let (w, h) = (surface.width(), surface.height());
    if w != INPUT_WIDTH || h != INPUT_HEIGHT {
        bail!(
            "离屏画面尺寸不合法: 期望 {}x{}, 实际 {}x{}",
            INPUT_WIDTH,
            INPUT_HEIGHT,
            w,
            h
        );
    }

    let mut ys = Array::zeros((1, 3, h as usize, w as usize)).into_dyn();
    for (x, y, pixel) in surface.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;
        let x = x as usize;
        let y = y as usize;
        ys[[0, 0, y, x]] = (r as f32) / 255.0;
        ys[[0, 1, y, x]] = (g as f32) / 255.0;
        ys[[0, 2, y, x]] = (b as f32) / 255.0;
    }
    Ok(ys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..(w * h) {
            buf.extend_from_slice(&rgba);
        }
        buf
    }

    #[test]
    fn test_tensor_shape_invariant() {
        let frame = solid_frame(INPUT_WIDTH, INPUT_HEIGHT, [10, 20, 30, 255]);
        let surface = to_surface(&frame, INPUT_WIDTH, INPUT_HEIGHT).unwrap();
        let tensor = to_input_tensor(&surface).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_eq!(tensor.len(), 3 * 640 * 640);
    }

    #[test]
    fn test_values_normalized_to_unit_range() {
        let frame = solid_frame(INPUT_WIDTH, INPUT_HEIGHT, [0, 128, 255, 7]);
        let surface = to_surface(&frame, INPUT_WIDTH, INPUT_HEIGHT).unwrap();
        let tensor = to_input_tensor(&surface).unwrap();
        for &v in tensor.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
        assert!((tensor[[0, 0, 0, 0]] - 0.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] - 128.0 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_dropped() {
        let opaque = solid_frame(INPUT_WIDTH, INPUT_HEIGHT, [50, 60, 70, 255]);
        let translucent = solid_frame(INPUT_WIDTH, INPUT_HEIGHT, [50, 60, 70, 3]);
        let a = to_input_tensor(&to_surface(&opaque, INPUT_WIDTH, INPUT_HEIGHT).unwrap()).unwrap();
        let b = to_input_tensor(&to_surface(&translucent, INPUT_WIDTH, INPUT_HEIGHT).unwrap())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_planar_channel_first_layout() {
        // 单独点亮(5,2)处的红色, 验证落点在R平面的行主序位置
        let mut frame = solid_frame(INPUT_WIDTH, INPUT_HEIGHT, [0, 0, 0, 255]);
        let idx = ((2 * INPUT_WIDTH + 5) * 4) as usize;
        frame[idx] = 255;
        let surface = to_surface(&frame, INPUT_WIDTH, INPUT_HEIGHT).unwrap();
        let tensor = to_input_tensor(&surface).unwrap();
        assert!((tensor[[0, 0, 2, 5]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 2, 5]].abs() < 1e-6);
        assert!(tensor[[0, 2, 2, 5]].abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_source_is_resized() {
        let frame = solid_frame(320, 240, [100, 100, 100, 255]);
        let surface = to_surface(&frame, 320, 240).unwrap();
        assert_eq!(surface.width(), INPUT_WIDTH);
        assert_eq!(surface.height(), INPUT_HEIGHT);
        let tensor = to_input_tensor(&surface).unwrap();
        assert_eq!(tensor.len(), 3 * 640 * 640);
    }

    #[test]
    fn test_bad_buffer_length_rejected() {
        let frame = vec![0u8; 100];
        assert!(to_surface(&frame, INPUT_WIDTH, INPUT_HEIGHT).is_err());
    }
}
