//! REST model-serving client.
//!
//! Request body is `{"inputs": [...]}` with the batch in channel-last layout
//! (`[N, H, W, C]`) scaled from `0..255` to `0..1`. The response must contain
//! an `"outputs"` array holding `N · out_h · out_w · C'` numbers in any
//! nesting, laid out channel-last. Outputs are returned as `[N, C', out_h, out_w]`.

use std::time::Duration;

use ndarray::{Array4, Axis};
use serde_json::Value;
use tracing::debug;

use super::InferenceBridge;
use crate::error::{MosaicError, Result};
use crate::source::HttpClient;

/// Default request timeout for inference calls.
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 120;

/// Inference through a JSON prediction endpoint.
pub struct RestInference<C: HttpClient> {
    client: C,
    url: String,
    output_channels: usize,
    output_size: Option<usize>,
    seconds_per_tile: f64,
}

impl<C: HttpClient> RestInference<C> {
    /// Creates a client for `url` returning `output_channels` channels.
    ///
    /// The output edge length is inferred from the response unless set with
    /// [`with_output_size`](Self::with_output_size).
    pub fn new(client: C, url: impl Into<String>, output_channels: usize) -> Self {
        Self {
            client,
            url: url.into(),
            output_channels,
            output_size: None,
            seconds_per_tile: 1.0,
        }
    }

    /// Fixes the expected output edge length.
    pub fn with_output_size(mut self, size: usize) -> Self {
        self.output_size = Some(size);
        self
    }

    /// Sets the per-tile time used by `estimate_time`.
    pub fn with_seconds_per_tile(mut self, seconds: f64) -> Self {
        self.seconds_per_tile = seconds;
        self
    }

    fn encode_inputs(batch: &Array4<f32>) -> Value {
        let channel_last = batch.view().permuted_axes([0, 2, 3, 1]);
        Value::Array(
            channel_last
                .axis_iter(Axis(0))
                .map(|item| {
                    Value::Array(
                        item.axis_iter(Axis(0))
                            .map(|row| {
                                Value::Array(
                                    row.axis_iter(Axis(0))
                                        .map(|pixel| {
                                            Value::Array(
                                                pixel.iter().map(|v| Value::from(v / 255.0)).collect(),
                                            )
                                        })
                                        .collect(),
                                )
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    fn output_edge(&self, per_channel: usize) -> Result<usize> {
        if let Some(size) = self.output_size {
            if size * size != per_channel {
                return Err(MosaicError::Inference(format!(
                    "expected {}x{} outputs per channel, got {} values",
                    size, size, per_channel
                )));
            }
            return Ok(size);
        }

        let edge = (per_channel as f64).sqrt().round() as usize;
        if edge * edge != per_channel {
            return Err(MosaicError::Inference(format!(
                "cannot infer square output from {} values per channel",
                per_channel
            )));
        }
        Ok(edge)
    }
}

/// Collects every number of a nested JSON array in document order.
fn flatten_numbers(value: &Value, out: &mut Vec<f32>) -> Result<()> {
    match value {
        Value::Array(items) => items.iter().try_for_each(|item| flatten_numbers(item, out)),
        Value::Number(n) => {
            let v = n
                .as_f64()
                .ok_or_else(|| MosaicError::Inference(format!("non-finite output {}", n)))?;
            out.push(v as f32);
            Ok(())
        }
        other => Err(MosaicError::Inference(format!(
            "unexpected value in outputs: {}",
            other
        ))),
    }
}

impl<C: HttpClient> InferenceBridge for RestInference<C> {
    fn predict_batch(&self, batch: Array4<f32>) -> Result<Array4<f32>> {
        let items = batch.dim().0;
        let body = serde_json::json!({ "inputs": Self::encode_inputs(&batch) });

        let response = self
            .client
            .post_json(&self.url, &body)
            .map_err(|e| MosaicError::Inference(format!("{}: {}", self.url, e)))?;

        let outputs = response
            .get("outputs")
            .ok_or_else(|| MosaicError::Inference("response has no 'outputs' field".to_string()))?;

        let mut values = Vec::new();
        flatten_numbers(outputs, &mut values)?;

        let per_item = items * self.output_channels;
        if per_item == 0 || values.len() % per_item != 0 {
            return Err(MosaicError::Inference(format!(
                "{} output values do not split into {} items of {} channels",
                values.len(),
                items,
                self.output_channels
            )));
        }
        let edge = self.output_edge(values.len() / per_item)?;
        debug!(items, edge, channels = self.output_channels, "Received inference outputs");

        let channel_last = Array4::from_shape_vec((items, edge, edge, self.output_channels), values)
            .map_err(|e| MosaicError::Inference(e.to_string()))?;

        Ok(channel_last
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned())
    }

    fn output_channels(&self) -> Option<usize> {
        Some(self.output_channels)
    }

    fn estimate_time(&self, tiles: usize) -> Duration {
        Duration::from_secs_f64(self.seconds_per_tile * tiles as f64)
    }

    fn name(&self) -> &str {
        "rest"
    }
}
