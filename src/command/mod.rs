mod generate;
mod setup;
mod status;

pub use generate::run_generate;
pub use setup::run_setup;
pub use status::run_status;
