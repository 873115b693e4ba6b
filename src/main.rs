fn main() {
    if let Err(err) = sqlpaste::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
