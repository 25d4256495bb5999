//! The tools the agent can call.

mod calculator;
mod current_time;
mod letter_counter;

pub use calculator::{
    CalculatorError, CalculatorParameters, CalculatorTool, evaluate,
    format_number,
};
pub use current_time::{CurrentTimeParameters, CurrentTimeTool};
pub use letter_counter::{
    LetterCountError, LetterCounterParameters, LetterCounterTool,
    count_letter, count_letter_value,
};
