use crate::core::{Pipeline, RunReport};
use crate::utils::error::Result;
use std::time::Instant;

/// Drives a pipeline through extract, transform and load.
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunReport> {
        let name = self.pipeline.name();
        let started = Instant::now();
        tracing::info!("Starting {} job", name);

        tracing::debug!("{}: extracting", name);
        let extracted = self.pipeline.extract().await?;

        tracing::debug!("{}: transforming", name);
        let transformed = self.pipeline.transform(extracted).await?;

        tracing::debug!("{}: loading", name);
        let report = self.pipeline.load(transformed).await?;

        tracing::info!(
            "{} job finished in {:.1?}: {} records, {} succeeded, {} failed",
            name,
            started.elapsed(),
            report.records,
            report.succeeded(),
            report.failed
        );
        for output in &report.outputs {
            tracing::info!("Output saved to: {}", output);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingPipeline {
        steps: Mutex<Vec<&'static str>>,
        fail_transform: bool,
    }

    #[async_trait]
    impl Pipeline for RecordingPipeline {
        type Extracted = Vec<u32>;
        type Transformed = Vec<u32>;

        fn name(&self) -> &str {
            "recording"
        }

        async fn extract(&self) -> Result<Vec<u32>> {
            self.steps.lock().unwrap().push("extract");
            Ok(vec![1, 2, 3])
        }

        async fn transform(&self, data: Vec<u32>) -> Result<Vec<u32>> {
            self.steps.lock().unwrap().push("transform");
            if self.fail_transform {
                return Err(EtlError::ProcessingError {
                    message: "boom".to_string(),
                });
            }
            Ok(data.into_iter().map(|n| n * 2).collect())
        }

        async fn load(&self, data: Vec<u32>) -> Result<RunReport> {
            self.steps.lock().unwrap().push("load");
            Ok(RunReport {
                job: "recording".to_string(),
                outputs: vec!["memory".to_string()],
                records: data.len(),
                failed: data.iter().filter(|n| **n > 4).count(),
            })
        }
    }

    #[tokio::test]
    async fn test_runs_steps_in_order() {
        let engine = EtlEngine::new(RecordingPipeline {
            steps: Mutex::new(Vec::new()),
            fail_transform: false,
        });

        let report = engine.run().await.unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            *engine.pipeline().steps.lock().unwrap(),
            vec!["extract", "transform", "load"]
        );
    }

    #[tokio::test]
    async fn test_stops_on_error() {
        let engine = EtlEngine::new(RecordingPipeline {
            steps: Mutex::new(Vec::new()),
            fail_transform: true,
        });

        assert!(engine.run().await.is_err());
        assert_eq!(
            *engine.pipeline().steps.lock().unwrap(),
            vec!["extract", "transform"]
        );
    }
}
