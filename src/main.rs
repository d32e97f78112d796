//! # Voxel Stream Entry Point
//!
//! Runs the headless streaming demo. Set `VOXEL_STREAM_CONFIG` to a JSON
//! configuration file and `RUST_LOG` to choose the log level.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

fn main() {
    voxel_stream::init_logging();
    if let Err(err) = voxel_stream::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
