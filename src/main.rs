fn main() {
    if let Err(err) = rfi_merge::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
