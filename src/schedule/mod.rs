pub mod evaluator;

pub use evaluator::{due_slot, is_day_active, is_due_now, next_due_in, NextDose};
