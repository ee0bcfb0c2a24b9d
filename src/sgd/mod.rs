mod engine;
mod schedule;
mod step;

pub use engine::UpdateEngine;
pub use schedule::{LearningRate, Regularization};
pub use step::{dot, gradient_step};
