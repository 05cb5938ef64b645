fn main() -> std::process::ExitCode {
    place_timeline_lib::run()
}
