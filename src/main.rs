//! Minimal entrypoint; all logic lives in the library and in `forgepipe-cli`.

fn main() {
    std::process::exit(forgepipe_cli::run());
}
