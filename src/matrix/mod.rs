//! Plain text rating matrices: a `ROWS COLS` header followed by `ROWS` lines
//! of `COLS` whitespace separated values, where `0` means unobserved.

mod convert;
mod generate;

use std::{fmt::Write as _, fs, io, path::Path};

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::{NomadErr, Result};

pub use convert::from_triplets;
pub use generate::generate_ratings;

/// A dense rating matrix loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingMatrix {
    values: Array2<f64>,
}

/// The outcome of comparing a predicted matrix against the ground truth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// The amount of non-zero ground-truth entries compared.
    pub checked: usize,
    /// The root of the mean squared error over those entries.
    pub rmse: f64,
}

fn invalid_data(msg: String) -> NomadErr {
    NomadErr::Io(io::Error::new(io::ErrorKind::InvalidData, msg))
}

fn parse_dim(token: Option<&str>, what: &str) -> Result<usize> {
    let token = token.ok_or_else(|| invalid_data(format!("missing {what} in header")))?;
    token
        .parse()
        .map_err(|e| invalid_data(format!("invalid {what} {token:?}: {e}")))
}

impl RatingMatrix {
    /// Wraps an in-memory matrix.
    pub fn new(values: Array2<f64>) -> Self {
        Self { values }
    }

    /// Parses the text representation of a matrix.
    ///
    /// # Arguments
    /// * `text` - The whole file contents.
    ///
    /// # Returns
    /// The matrix, a `MatrixShape` error if the body disagrees with the header
    /// or an `Io` error if a value isn't a number.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let mut header = lines.next().unwrap_or_default().split_whitespace();
        let rows = parse_dim(header.next(), "row count")?;
        let cols = parse_dim(header.next(), "column count")?;

        let mut data = Vec::with_capacity(rows * cols);
        let mut seen_rows = 0;

        for line in lines {
            let before = data.len();
            for token in line.split_whitespace() {
                let value: f64 = token
                    .parse()
                    .map_err(|e| invalid_data(format!("invalid rating {token:?}: {e}")))?;
                data.push(value);
            }

            let width = data.len() - before;
            if width != cols {
                return Err(NomadErr::MatrixShape {
                    expected: (rows, cols),
                    got: (seen_rows + 1, width),
                });
            }

            seen_rows += 1;
        }

        if seen_rows != rows {
            return Err(NomadErr::MatrixShape {
                expected: (rows, cols),
                got: (seen_rows, cols),
            });
        }

        let values = Array2::from_shape_vec((rows, cols), data).map_err(|_| {
            NomadErr::MatrixShape {
                expected: (rows, cols),
                got: (seen_rows, cols),
            }
        })?;

        Ok(Self { values })
    }

    /// Reads and parses the matrix stored at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Returns `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, f64> {
        self.values.row(row)
    }

    /// Returns the amount of observed ratings in every row.
    pub fn density(&self) -> Vec<usize> {
        self.values
            .rows()
            .into_iter()
            .map(|row| row.iter().filter(|&&v| v != 0.).count())
            .collect()
    }

    /// Copies the given rows, in the given order, into a new matrix.
    ///
    /// # Arguments
    /// * `rows` - Original row indices, all of them must be in bounds.
    pub fn select(&self, rows: &[usize]) -> Self {
        Self {
            values: self.values.select(Axis(0), rows),
        }
    }
}

/// Renders `values` in the text format with `precision` decimals per entry.
pub fn format_matrix(values: &Array2<f64>, precision: usize) -> String {
    let (rows, cols) = values.dim();
    let mut out = format!("{rows} {cols}\n");

    for row in values.rows() {
        let mut sep = "";
        for value in row {
            // SAFETY: Writing into a `String` never fails.
            write!(out, "{sep}{value:.precision$}").unwrap();
            sep = " ";
        }
        out.push('\n');
    }

    out
}

/// Writes `values` to `path` in the text format.
pub fn write_matrix(path: impl AsRef<Path>, values: &Array2<f64>, precision: usize) -> Result<()> {
    fs::write(path, format_matrix(values, precision))?;
    Ok(())
}

/// Compares `pred` against `truth` on every non-zero entry of `truth`.
///
/// # Returns
/// The evaluation, or a `MatrixShape` error if both matrices differ in shape.
pub fn evaluate(pred: &Array2<f64>, truth: &Array2<f64>) -> Result<Evaluation> {
    if pred.dim() != truth.dim() {
        return Err(NomadErr::MatrixShape {
            expected: truth.dim(),
            got: pred.dim(),
        });
    }

    let (checked, total) = pred
        .iter()
        .zip(truth)
        .filter(|&(_, &t)| t != 0.)
        .fold((0, 0.), |(n, acc), (&p, &t)| (n + 1, acc + (p - t).powi(2)));

    let rmse = if checked == 0 {
        0.
    } else {
        (total / checked as f64).sqrt()
    };

    Ok(Evaluation { checked, rmse })
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    const SMALL: &str = "4 3\n5 3 0\n4 0 0\n1 1 0\n0 1 5\n";

    #[test]
    fn parses_header_and_body() {
        let matrix = RatingMatrix::parse(SMALL).unwrap();

        assert_eq!(matrix.shape(), (4, 3));
        assert_eq!(matrix.row(3).to_vec(), [0., 1., 5.]);
        assert_eq!(matrix.density(), [2, 1, 2, 2]);
    }

    #[test]
    fn short_row_is_a_shape_error() {
        let err = RatingMatrix::parse("2 3\n1 2 3\n4 5\n").unwrap_err();
        assert!(matches!(
            err,
            NomadErr::MatrixShape {
                expected: (2, 3),
                got: (2, 2)
            }
        ));
    }

    #[test]
    fn missing_rows_is_a_shape_error() {
        let err = RatingMatrix::parse("3 2\n1 2\n3 4\n").unwrap_err();
        assert!(matches!(err, NomadErr::MatrixShape { got: (2, 2), .. }));
    }

    #[test]
    fn garbage_is_invalid_data() {
        let err = RatingMatrix::parse("1 2\n1 x\n").unwrap_err();
        assert!(matches!(err, NomadErr::Io(e) if e.kind() == io::ErrorKind::InvalidData));

        let err = RatingMatrix::parse("").unwrap_err();
        assert!(matches!(err, NomadErr::Io(_)));
    }

    #[test]
    fn select_keeps_requested_order() {
        let matrix = RatingMatrix::parse(SMALL).unwrap();
        let segment = matrix.select(&[3, 0]);

        assert_eq!(segment.shape(), (2, 3));
        assert_eq!(segment.row(0).to_vec(), [0., 1., 5.]);
        assert_eq!(segment.row(1).to_vec(), [5., 3., 0.]);
    }

    #[test]
    fn formatted_matrix_parses_back() {
        let values = array![[1.25, 0.], [3.5, -2.125]];
        let text = format_matrix(&values, 4);

        assert_eq!(text, "2 2\n1.2500 0.0000\n3.5000 -2.1250\n");
        assert_eq!(RatingMatrix::parse(&text).unwrap().values(), &values);
    }

    #[test]
    fn evaluation_skips_unobserved_entries() {
        let truth = array![[4., 0.], [0., 2.]];
        let pred = array![[3., 100.], [-7., 5.]];

        let eval = evaluate(&pred, &truth).unwrap();
        assert_eq!(eval.checked, 2);
        assert!((eval.rmse - 5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn evaluation_rejects_shape_mismatch() {
        let err = evaluate(&Array2::zeros((2, 2)), &Array2::zeros((2, 3))).unwrap_err();
        assert!(matches!(err, NomadErr::MatrixShape { .. }));
    }
}
