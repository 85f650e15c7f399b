pub mod json_loader;
pub mod toml_loader;

pub use json_loader::load_all_submission_files;
pub use toml_loader::load_seed_file;
