fn main() {
    if let Err(err) = plantprep::run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
