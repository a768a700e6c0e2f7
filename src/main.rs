fn main() -> std::process::ExitCode {
    govbrain_lib::run()
}
