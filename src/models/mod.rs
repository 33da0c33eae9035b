pub mod medicine;

pub use medicine::{Frequency, MedicineRecord, NewMedicine, TimeOfDay, MINUTES_PER_DAY};
