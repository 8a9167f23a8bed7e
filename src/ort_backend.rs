// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime推理后端
// 会话在进程启动时创建一次, 之后只读共享; 每个采样周期调用一次run

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::{CUDAExecutionProvider, GraphOptimizationLevel, Session, TensorRTExecutionProvider};

/// 执行后端选择
#[derive(Debug, Clone, Copy)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    /// 模型文件路径
    pub model: String,
    pub ep: OrtEP,
    /// 推理引擎运行库目录 (可选, 模型加载前配置一次)
    pub dylib_dir: Option<String>,
}

/// 单个输出: 声明名 + 扁平f32缓冲区
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub name: String,
    pub data: Vec<f32>,
}

/// 按声明名查找输出缓冲区
pub fn find_output<'a>(outputs: &'a [RawOutput], name: &str) -> Option<&'a [f32]> {
    outputs
        .iter()
        .find(|o| o.name == name)
        .map(|o| o.data.as_slice())
}

pub struct OrtBackend {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        // 运行库目录需在会话创建前生效
        if let Some(dir) = &config.dylib_dir {
            std::env::set_var("ORT_DYLIB_PATH", dir);
            println!("📦 推理引擎运行库目录: {}", dir);
        }

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;
        let builder = match config.ep {
            OrtEP::CPU => builder,
            OrtEP::CUDA(id) => builder.with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(id)
                .build()])?,
            OrtEP::Trt(id) => {
                builder.with_execution_providers([TensorRTExecutionProvider::default()
                    .with_device_id(id)
                    .build()])?
            }
        };

        let session = builder
            .commit_from_file(&config.model)
            .with_context(|| format!("模型加载失败: {}", config.model))?;

        // 输入按声明顺序取第一个; 输出记录全部声明名供按名查找
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("模型未声明任何输入")?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.is_empty() {
            anyhow::bail!("模型未声明任何输出");
        }

        Ok(Self {
            session,
            input_name,
            output_names,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// 执行一次推理: 张量喂给第一个声明输入, 返回全部f32输出
    ///
    /// 非f32类型的输出跳过并告警, 不视为失败。
    pub fn run(&self, tensor: &Array<f32, IxDyn>) -> Result<Vec<RawOutput>> {
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor.view()]?)?;

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let Some(value) = outputs.get(name.as_str()) else {
                continue;
            };
            match value.try_extract_tensor::<f32>() {
                Ok(view) => ys.push(RawOutput {
                    name: name.clone(),
                    data: view.iter().copied().collect(),
                }),
                Err(e) => {
                    eprintln!("⚠️ 输出 {} 不是f32张量, 跳过: {}", name, e);
                }
            }
        }
        Ok(ys)
    }

    pub fn summary(&self) {
        println!(
            "\nSummary:\n\
            > Input: {}\n\
            > Outputs: {:?}\n",
            self.input_name, self.output_names,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_output_by_name() {
        let outputs = vec![
            RawOutput {
                name: "boxes".into(),
                data: vec![1.0, 2.0],
            },
            RawOutput {
                name: "scores".into(),
                data: vec![0.5],
            },
        ];
        assert_eq!(find_output(&outputs, "scores"), Some(&[0.5][..]));
        assert_eq!(find_output(&outputs, "boxes"), Some(&[1.0, 2.0][..]));
        assert!(find_output(&outputs, "labels").is_none());
    }
}
