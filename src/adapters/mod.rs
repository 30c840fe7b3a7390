// Adapters layer: concrete implementations of the domain ports (processes, http).

pub mod http;
pub mod process;

pub use http::HttpDownloader;
pub use process::SystemRunner;
