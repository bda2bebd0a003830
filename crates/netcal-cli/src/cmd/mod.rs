pub mod best;
pub mod run;
pub mod validate;
