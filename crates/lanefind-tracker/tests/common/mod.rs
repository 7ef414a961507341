pub mod synthetic_mask;
