use std::{env, process::ExitCode};

use log::error;

use nomad::{
    RatingMatrix,
    matrix::{Evaluation, evaluate},
};

fn compare(pred: &str, truth: &str) -> nomad::Result<Evaluation> {
    let pred = RatingMatrix::read(pred)?;
    let truth = RatingMatrix::read(truth)?;
    evaluate(pred.values(), truth.values())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [pred, truth] = args.as_slice() else {
        error!("usage: nomad-eval <predicted> <ground-truth>");
        return ExitCode::FAILURE;
    };

    match compare(pred, truth) {
        Ok(eval) => {
            println!("Total instance checked = {}", eval.checked);
            println!("RMSE = {:.4}", eval.rmse);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("evaluation failed: {e}");
            ExitCode::FAILURE
        }
    }
}
