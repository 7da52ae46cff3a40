pub mod commit;
pub mod deployment;
pub mod status;
pub mod target;
