use std::process::ExitCode;

use trigrid::config::Variant;

fn main() -> ExitCode {
    trigrid::launch(Variant::Grid2d)
}
