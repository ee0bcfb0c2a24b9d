use log::trace;
use ndarray::Array2;

use super::{LearningRate, Regularization, gradient_step};
use crate::{
    error::Result,
    storage::{RemoteHandle, RowFactors},
};

/// Applies SGD updates for every locally owned rating of a column at once.
///
/// It keeps a visit counter per rating of the local segment, which drives the
/// learning-rate schedule.
#[derive(Debug)]
pub struct UpdateEngine {
    items: usize,
    width: usize,
    schedule: LearningRate,
    lambda: f64,
    regularization: Regularization,
    visits: Vec<u64>,
    column: Vec<f64>,
}

impl UpdateEngine {
    /// Creates a new `UpdateEngine`.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows of the local segment.
    /// * `items` - The amount of columns of the rating matrix.
    /// * `width` - The embedding dimension.
    /// * `schedule` - The step size schedule.
    /// * `lambda` - The regularization strength.
    /// * `regularization` - The penalty applied to both embeddings.
    pub fn new(
        rows: usize,
        items: usize,
        width: usize,
        schedule: LearningRate,
        lambda: f64,
        regularization: Regularization,
    ) -> Self {
        Self {
            items,
            width,
            schedule,
            lambda,
            regularization,
            visits: vec![0; rows * items],
            column: vec![0.; width],
        }
    }

    /// Returns how many updates the rating at local `row` and column `item` got.
    pub fn visits(&self, row: usize, item: usize) -> u64 {
        self.visits[row * self.items + item]
    }

    /// Runs one update per observed rating of `item` in the local segment.
    ///
    /// For every such rating the column embedding is fetched from its hosting
    /// process, stepped together with the local row embedding and written back.
    ///
    /// # Arguments
    /// * `item` - The column whose token is held.
    /// * `ratings` - The local segment of the rating matrix.
    /// * `factors` - The local row embeddings.
    /// * `column` - The handle to the column embeddings.
    ///
    /// # Returns
    /// The amount of updates applied, or the first remote access failure.
    pub async fn update(
        &mut self,
        item: usize,
        ratings: &Array2<f64>,
        factors: &mut RowFactors,
        column: &RemoteHandle,
    ) -> Result<usize> {
        let offset = item * self.width;
        let mut applied = 0;

        for row in 0..ratings.nrows() {
            let rating = ratings[[row, item]];
            if rating == 0. {
                continue;
            }

            let visits = &mut self.visits[row * self.items + item];
            *visits += 1;
            let lr = self.schedule.at(*visits);

            column.read(offset, &mut self.column).await?;
            let err = gradient_step(
                factors.row_mut(row),
                &mut self.column,
                rating,
                lr,
                self.lambda,
                self.regularization,
            );
            column.write(offset, &self.column).await?;

            applied += 1;
            trace!(row = row, item = item; "sgd step: err={err:.4} lr={lr:.6}");
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ndarray::array;

    use super::*;
    use crate::storage::{ColumnSegment, SegmentHandle};

    const SCHEDULE: LearningRate = LearningRate {
        alpha: 0.1,
        beta: 0.,
        exponent: 1.5,
    };

    async fn column(items: usize, width: usize) -> (Arc<ColumnSegment>, RemoteHandle) {
        let segment = Arc::new(ColumnSegment::zeroed(items, width));
        let handle = SegmentHandle::local(0, Some(Arc::clone(&segment)))
            .resolve()
            .await
            .unwrap();

        (segment, handle)
    }

    #[tokio::test]
    async fn updates_only_observed_ratings() {
        let (segment, handle) = column(2, 2).await;
        segment.write(2, &[0.5, 0.5]).unwrap();

        let ratings = array![[0., 2.], [3., 0.]];
        let mut factors = RowFactors::zeroed(2, 2);
        factors.write_row_factor(0, &[1., 2.]);
        factors.write_row_factor(1, &[9., 9.]);

        let mut engine = UpdateEngine::new(2, 2, 2, SCHEDULE, 0., Regularization::WeightDecay);
        let applied = engine.update(1, &ratings, &mut factors, &handle).await.unwrap();

        assert_eq!(applied, 1);
        assert_eq!(engine.visits(0, 1), 1);
        assert_eq!(engine.visits(1, 1), 0);
        assert_eq!(factors.row(1), [9., 9.]);

        let w = factors.row(0);
        assert!((w[0] - 1.025).abs() < 1e-12 && (w[1] - 2.025).abs() < 1e-12);

        let mut h = [0.; 2];
        segment.read(2, &mut h).unwrap();
        assert!((h[0] - 0.55).abs() < 1e-12 && (h[1] - 0.6).abs() < 1e-12);
        assert_eq!(segment.get(0).unwrap(), 0.);
    }

    #[tokio::test]
    async fn each_row_sees_the_previous_column_write() {
        let (segment, handle) = column(1, 1).await;
        segment.put(0, 1.).unwrap();

        let ratings = array![[2.], [2.]];
        let mut factors = RowFactors::zeroed(2, 1);
        factors.write_row_factor(0, &[1.]);
        factors.write_row_factor(1, &[1.]);

        let mut engine = UpdateEngine::new(2, 1, 1, SCHEDULE, 0., Regularization::WeightDecay);
        engine.update(0, &ratings, &mut factors, &handle).await.unwrap();

        // First row: err = -1, h = 1 + 0.1 = 1.1, w = 1.1.
        // Second row: err = 1.1 - 2 = -0.9, w = 1 + 0.099, h = 1.1 + 0.09.
        assert!((segment.get(0).unwrap() - 1.19).abs() < 1e-12);
        assert!((factors.row(1)[0] - 1.099).abs() < 1e-12);
    }

    #[tokio::test]
    async fn step_size_decays_from_the_first_visit() {
        let (segment, handle) = column(1, 1).await;
        segment.put(0, 1.).unwrap();

        let ratings = array![[2.]];
        let mut factors = RowFactors::zeroed(1, 1);
        factors.write_row_factor(0, &[1.]);

        let schedule = LearningRate {
            alpha: 0.1,
            beta: 1.,
            exponent: 1.,
        };
        let mut engine = UpdateEngine::new(1, 1, 1, schedule, 0., Regularization::WeightDecay);

        // t = 1: lr = 0.1 / 2, err = -1.
        engine.update(0, &ratings, &mut factors, &handle).await.unwrap();
        assert_eq!(engine.visits(0, 0), 1);
        assert!((factors.row(0)[0] - 1.05).abs() < 1e-12);
        assert!((segment.get(0).unwrap() - 1.05).abs() < 1e-12);

        // t = 2: lr = 0.1 / 3, err = 1.05^2 - 2 = -0.8975.
        engine.update(0, &ratings, &mut factors, &handle).await.unwrap();
        let expected = 1.05 + 0.1 / 3. * 0.8975 * 1.05;
        assert!((factors.row(0)[0] - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn empty_column_is_a_no_op() {
        let (_, handle) = column(2, 3).await;
        let ratings = array![[1., 0.], [4., 0.]];
        let mut factors = RowFactors::zeroed(2, 3);

        let mut engine = UpdateEngine::new(2, 2, 3, SCHEDULE, 0.01, Regularization::NormScaled);
        assert_eq!(engine.update(1, &ratings, &mut factors, &handle).await.unwrap(), 0);
    }
}
