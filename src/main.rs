fn main() {
    std::process::exit(catchrun::cli::run());
}
