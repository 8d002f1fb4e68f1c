pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;

/// Display label for a model file: the file name without its `.gguf` extension.
pub fn model_label(path: &str) -> &str {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file_name.strip_suffix(".gguf").unwrap_or(file_name)
}
