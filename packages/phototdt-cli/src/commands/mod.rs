pub mod batch;
pub mod info;
pub mod run;
