pub fn main() -> std::process::ExitCode {
    formula_gc::run()
}
