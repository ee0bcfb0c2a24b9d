use ndarray::Array2;

use super::{RatingMatrix, invalid_data};
use crate::error::{NomadErr, Result};

/// The amount of fields of a rating record: user, item, rating and timestamp.
const FIELDS: usize = 4;

fn parse_id(token: &str, what: &str, bound: usize, shape: (usize, usize)) -> Result<usize> {
    let id: usize = token
        .parse()
        .map_err(|e| invalid_data(format!("invalid {what} id {token:?}: {e}")))?;

    match id {
        0 => Err(invalid_data(format!("{what} ids start at 1, got 0"))),
        id if id > bound => Err(NomadErr::MatrixShape {
            expected: shape,
            got: if what == "user" {
                (id, shape.1)
            } else {
                (shape.0, id)
            },
        }),
        id => Ok(id - 1),
    }
}

/// Builds a dense rating matrix out of `user item rating timestamp` records.
///
/// Ids are 1-based, the timestamp is ignored and a repeated `(user, item)`
/// pair keeps the last rating. Cells without a record stay `0`.
///
/// # Arguments
/// * `text` - Whitespace separated records.
/// * `rows` - The declared amount of users.
/// * `cols` - The declared amount of items.
///
/// # Returns
/// The matrix, a `MatrixShape` error if an id exceeds the declared shape or
/// an `Io` error if a record is malformed or incomplete.
pub fn from_triplets(text: &str, rows: usize, cols: usize) -> Result<RatingMatrix> {
    let shape = (rows, cols);
    let mut values = Array2::zeros(shape);

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut records = tokens.chunks_exact(FIELDS);

    for record in records.by_ref() {
        let user = parse_id(record[0], "user", rows, shape)?;
        let item = parse_id(record[1], "item", cols, shape)?;
        let rating: f64 = record[2]
            .parse()
            .map_err(|e| invalid_data(format!("invalid rating {:?}: {e}", record[2])))?;

        values[[user, item]] = rating;
    }

    if !records.remainder().is_empty() {
        return Err(invalid_data(format!(
            "trailing record with {} of {FIELDS} fields",
            records.remainder().len()
        )));
    }

    Ok(RatingMatrix::new(values))
}
