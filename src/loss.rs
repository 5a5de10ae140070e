//! Loss functions
//!
//! A loss is a pure pair: `f(teacher, output)` for the scalar objective and
//! `df(teacher, output)` for its gradient w.r.t. `output`.

use std::fmt;

/// Scalar objective consumed by the trainer.
pub trait Loss: Send + Sync + fmt::Debug {
    fn f(&self, teacher: &[f32], output: &[f32]) -> f32;

    fn df(&self, teacher: &[f32], output: &[f32]) -> Vec<f32>;
}

/// Mean squared error over the output width: `Σ(o - t)² / M`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mse;

impl Loss for Mse {
    fn f(&self, teacher: &[f32], output: &[f32]) -> f32 {
        debug_assert_eq!(teacher.len(), output.len());
        let width = output.len() as f32;
        output
            .iter()
            .zip(teacher)
            .map(|(o, t)| (o - t) * (o - t))
            .sum::<f32>()
            / width
    }

    fn df(&self, teacher: &[f32], output: &[f32]) -> Vec<f32> {
        debug_assert_eq!(teacher.len(), output.len());
        let scale = 2.0 / output.len() as f32;
        output
            .iter()
            .zip(teacher)
            .map(|(o, t)| scale * (o - t))
            .collect()
    }
}
